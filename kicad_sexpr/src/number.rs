use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{map_res, opt, recognize},
    sequence::tuple,
    IResult,
};

fn parse_float(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((opt(alt((tag("-"), tag("+")))), digit1, tag("."), digit1))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn parse_int(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((opt(alt((tag("-"), tag("+")))), digit1))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

pub fn parse_number(input: &str) -> IResult<&str, f64> {
    alt((parse_float, parse_int))(input)
}
