//! Wire synthesis. Every net gets its own horizontal channel line, and every
//! endpoint is tied to the net's anchor with an orthogonal path running
//! through that channel.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;
use serde::Deserialize;

use crate::{
    common::{IdSource, Placement, Point, Rotation, TOLERANCE},
    document::{
        Document, Element, GlobalLabel, Junction, LabelShape, NoConnect, PowerSymbol, Wire,
        POWER_LIBRARY,
    },
    net::{Endpoint, Net, NetModel},
    AutowireError, Diagnostic,
};

/// Where the channel lines are measured from.
#[derive(Debug, Default, PartialEq, Clone, Copy, Deserialize)]
#[serde(from = "ChannelBaseRepr")]
pub enum ChannelBase {
    /// Past the lowest pin or anchor of the whole routing, lane `i` sitting
    /// `i + 1` spacings away from it
    #[default]
    Shared,
    /// The y coordinate of each net's own anchor
    Anchor,
    /// One fixed y coordinate shared by every net
    Absolute(f64),
}

impl ChannelBase {
    /// `origin` is the y coordinate [`ChannelBase::Shared`] channels are
    /// measured from.
    fn channel_y(self, lane: usize, spacing: f64, anchor: Point, origin: f64) -> f64 {
        match self {
            Self::Shared => origin + (lane + 1) as f64 * spacing,
            Self::Anchor => anchor.y + lane as f64 * spacing,
            Self::Absolute(y) => y + lane as f64 * spacing,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelBaseRepr {
    Keyword(ChannelBaseKeyword),
    Absolute(f64),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ChannelBaseKeyword {
    Shared,
    Anchor,
}

impl From<ChannelBaseRepr> for ChannelBase {
    fn from(repr: ChannelBaseRepr) -> Self {
        match repr {
            ChannelBaseRepr::Keyword(ChannelBaseKeyword::Shared) => Self::Shared,
            ChannelBaseRepr::Keyword(ChannelBaseKeyword::Anchor) => Self::Anchor,
            ChannelBaseRepr::Absolute(y) => Self::Absolute(y),
        }
    }
}

/// How a net is marked at its anchor.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    #[default]
    Global,
    /// A `power:<net>` symbol. Falls back to a global label when the
    /// document does not embed that symbol.
    Power,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RoutingOptions {
    /// Distance between two neighbouring channels, in document units
    pub channel_spacing: f64,
    pub channel_base: ChannelBase,
    /// Anchor a net on an existing global label of the same name instead of
    /// its first endpoint
    pub reuse_existing_labels: bool,
    /// Nets missing here get a global label
    pub label_kinds: BTreeMap<String, LabelKind>,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            channel_spacing: 2.54,
            channel_base: ChannelBase::Shared,
            reuse_existing_labels: false,
            label_kinds: BTreeMap::new(),
        }
    }
}

impl RoutingOptions {
    fn label_kind(&self, net: &str) -> LabelKind {
        self.label_kinds.get(net).copied().unwrap_or_default()
    }
}

/// The lane of every net. Lanes are handed out in lexicographic order of the
/// net names, so lane `i` sits `i × spacing` away from the channel base.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct RoutingChannels {
    lanes: BTreeMap<String, usize>,
    spacing: f64,
}

impl RoutingChannels {
    pub fn assign<'a>(
        names: impl IntoIterator<Item = &'a str>,
        spacing: f64,
    ) -> Result<Self, AutowireError> {
        let mut names = names.into_iter().collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();

        // Offsets are monotonic in the lane, so neighbours are enough
        for (lane, pair) in names.windows(2).enumerate() {
            let offset = lane as f64 * spacing;
            let next = (lane + 1) as f64 * spacing;

            if (offset - next).abs() < TOLERANCE {
                return Err(AutowireError::ChannelCollision {
                    first_net: pair[0].to_string(),
                    second_net: pair[1].to_string(),
                    offset,
                });
            }
        }

        Ok(Self {
            lanes: names
                .into_iter()
                .enumerate()
                .map(|(lane, name)| (name.to_string(), lane))
                .collect(),
            spacing,
        })
    }

    pub fn lane(&self, net: &str) -> Option<usize> {
        self.lanes.get(net).copied()
    }

    pub fn offset(&self, net: &str) -> Option<f64> {
        self.lane(net).map(|lane| lane as f64 * self.spacing)
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Markers already present in the document, which synthesis must not
/// duplicate.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ExistingMarkers {
    pub global_labels: Vec<(String, Point)>,
    pub no_connects: Vec<Point>,
    /// Placed power ports, by entry name and origin
    pub power_symbols: Vec<(String, Point)>,
    /// Power ports embedded in `lib_symbols`, with the offset of their pin
    pub power_definitions: BTreeMap<String, Point>,
    /// Every component reference in use
    pub references: BTreeSet<String>,
}

impl ExistingMarkers {
    pub fn from_document(document: &Document) -> Self {
        let is_power = |nickname: &Option<String>| nickname.as_deref() == Some(POWER_LIBRARY);

        Self {
            global_labels: document
                .global_labels()
                .map(|label| (label.name.clone(), label.placement.position))
                .collect(),
            no_connects: document.no_connects().map(|nc| nc.position).collect(),
            power_symbols: document
                .components()
                .filter(|c| is_power(&c.library_id.library_nickname))
                .map(|c| (c.library_id.entry_name.clone(), c.position))
                .collect(),
            power_definitions: document
                .library_symbols()
                .filter(|symbol| is_power(&symbol.id.library_nickname))
                .filter_map(|symbol| {
                    let pin = symbol.pins.first()?;
                    Some((symbol.id.entry_name.clone(), pin.offset))
                })
                .collect(),
            references: document
                .components()
                .filter_map(|c| c.reference.clone())
                .collect(),
        }
    }

    fn has_label(&self, name: &str, position: Point) -> bool {
        self.global_labels
            .iter()
            .any(|(n, p)| n == name && p.same_as(&position))
    }

    fn has_power_symbol(&self, name: &str, position: Point) -> bool {
        self.power_symbols
            .iter()
            .any(|(n, p)| n == name && p.same_as(&position))
    }

    fn nearest_label(&self, name: &str, to: Point) -> Option<Point> {
        self.global_labels
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, p)| *p)
            .min_by(|a, b| a.distance_squared(&to).total_cmp(&b.distance_squared(&to)))
    }

    fn has_no_connect(&self, position: Point) -> bool {
        self.no_connects.iter().any(|p| p.same_as(&position))
    }
}

/// The output of [`synthesize`].
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Synthesis {
    /// Every new element, in the order it should be written
    pub elements: Vec<Element>,
    pub channels: RoutingChannels,
    /// Conflicts found when checking the result, see [`Diagnostic::RoutingConflict`]
    pub diagnostics: Vec<Diagnostic>,
}

/// An axis-aligned wire segment.
#[derive(Debug, PartialEq, Clone, Copy)]
struct Segment {
    start: Point,
    end: Point,
}

impl Segment {
    fn is_horizontal(&self) -> bool {
        (self.start.y - self.end.y).abs() < TOLERANCE
    }

    fn is_vertical(&self) -> bool {
        (self.start.x - self.end.x).abs() < TOLERANCE
    }

    /// Same segment regardless of direction
    fn key(&self) -> ((i64, i64), (i64, i64)) {
        let (a, b) = (self.start.grid_key(), self.end.grid_key());
        (a.min(b), a.max(b))
    }

    fn has_end(&self, point: &Point) -> bool {
        self.start.same_as(point) || self.end.same_as(point)
    }

    /// Returns true if `point` lies on the segment, ends included.
    fn contains(&self, point: &Point) -> bool {
        let within = |v: f64, a: f64, b: f64| v >= a.min(b) - TOLERANCE && v <= a.max(b) + TOLERANCE;

        if self.is_horizontal() {
            (point.y - self.start.y).abs() < TOLERANCE && within(point.x, self.start.x, self.end.x)
        } else if self.is_vertical() {
            (point.x - self.start.x).abs() < TOLERANCE && within(point.y, self.start.y, self.end.y)
        } else {
            false
        }
    }

    /// Returns the start of the shared run if both segments lie on the same
    /// line and overlap for more than a single point.
    fn overlap(&self, other: &Segment) -> Option<Point> {
        let run = |a0: f64, a1: f64, b0: f64, b1: f64| {
            let low = a0.min(a1).max(b0.min(b1));
            let high = a0.max(a1).min(b0.max(b1));

            (high - low > TOLERANCE).then_some(low)
        };

        if self.is_horizontal()
            && other.is_horizontal()
            && (self.start.y - other.start.y).abs() < TOLERANCE
        {
            run(self.start.x, self.end.x, other.start.x, other.end.x)
                .map(|x| Point::new(x, self.start.y))
        } else if self.is_vertical()
            && other.is_vertical()
            && (self.start.x - other.start.x).abs() < TOLERANCE
        {
            run(self.start.y, self.end.y, other.start.y, other.end.y)
                .map(|y| Point::new(self.start.x, y))
        } else {
            None
        }
    }
}

/// The route from one endpoint to the anchor: down (or up) to the channel,
/// along the channel, then to the anchor. Zero-length legs are left out.
fn route(from: Point, anchor: Point, channel_y: f64) -> Vec<Segment> {
    if from.same_as(&anchor) {
        return Vec::new();
    }

    if (from.x - anchor.x).abs() < TOLERANCE {
        return vec![Segment {
            start: from,
            end: anchor,
        }];
    }

    let corners = [
        from,
        Point::new(from.x, channel_y),
        Point::new(anchor.x, channel_y),
        anchor,
    ];

    corners
        .windows(2)
        .filter(|leg| !leg[0].same_as(&leg[1]))
        .map(|leg| Segment {
            start: leg[0],
            end: leg[1],
        })
        .collect()
}

/// Points where two segments of the same net meet at a right angle, either
/// end to end or end to middle.
fn junction_points(segments: &[Segment]) -> Vec<Point> {
    let mut points = Vec::<Point>::new();

    for segment in segments {
        for point in [segment.start, segment.end] {
            let bends = segments.iter().any(|other| {
                other.contains(&point) && segment.is_horizontal() != other.is_horizontal()
            });

            if bends && !points.iter().any(|p| p.same_as(&point)) {
                points.push(point);
            }
        }
    }

    points
}

/// A net with its anchor and the wires reaching it.
struct NetPlan<'a> {
    net: &'a Net,
    anchor: Point,
    /// Anchored on an existing global label
    reused: bool,
    channel_y: f64,
    segments: Vec<Segment>,
}

impl NetPlan<'_> {
    fn uses_channel(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.is_horizontal() && (s.start.y - self.channel_y).abs() < TOLERANCE)
    }
}

/// The y coordinate shared channels are measured from: the lowest pin or
/// anchor for a positive spacing, the highest one otherwise.
fn channel_origin(net_model: &NetModel, anchors: &[Point], spacing: f64) -> f64 {
    let ys = net_model
        .nets
        .values()
        .flat_map(|net| &net.endpoints)
        .map(|endpoint| endpoint.position.y)
        .chain(net_model.unassigned_pins.iter().map(|pin| pin.position.y))
        .chain(anchors.iter().map(|anchor| anchor.y));

    let origin = if spacing < 0.0 {
        ys.reduce(f64::min)
    } else {
        ys.reduce(f64::max)
    };

    origin.unwrap_or_default()
}

/// Two nets whose channels lie on the same line would be merged by it.
fn check_channel_lines(plans: &[NetPlan]) -> Result<(), AutowireError> {
    let mut lines = plans
        .iter()
        .filter(|plan| plan.uses_channel())
        .map(|plan| (plan.channel_y, plan.net.name.as_str()))
        .collect::<Vec<_>>();

    lines.sort_by(|a, b| a.0.total_cmp(&b.0));

    for pair in lines.windows(2) {
        let ((y, first), (next, second)) = (pair[0], pair[1]);

        if (next - y).abs() < TOLERANCE {
            return Err(AutowireError::ChannelCollision {
                first_net: first.to_string(),
                second_net: second.to_string(),
                offset: y,
            });
        }
    }

    Ok(())
}

/// Returns the first `#PWRnn` reference not in `taken`, and takes it.
fn next_power_reference(taken: &mut BTreeSet<String>) -> String {
    let mut number = 1;

    loop {
        let reference = format!("#PWR{number:02}");

        if taken.insert(reference.clone()) {
            return reference;
        }

        number += 1;
    }
}

/// The global label or power port marking `net` at `anchor`, unless an
/// identical one is already there.
fn anchor_marker(
    net: &str,
    anchor: Point,
    kind: LabelKind,
    existing: &ExistingMarkers,
    references: &mut BTreeSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
    ids: &mut dyn IdSource,
) -> Option<Element> {
    if kind == LabelKind::Power {
        match existing.power_definitions.get(net) {
            Some(pin) => {
                // The pin, not the symbol origin, sits on the anchor
                let position = anchor.translate(-pin.x, -pin.y);

                if existing.has_power_symbol(net, position) {
                    return None;
                }

                return Some(Element::PowerSymbol(PowerSymbol {
                    net: net.to_string(),
                    reference: next_power_reference(references),
                    position,
                    uuid: Some(ids.next_id()),
                    pin_uuid: Some(ids.next_id()),
                }));
            }
            None => Diagnostic::MissingPowerSymbol {
                net: net.to_string(),
            }
            .record(diagnostics),
        }
    }

    if existing.has_label(net, anchor) {
        return None;
    }

    Some(Element::GlobalLabel(GlobalLabel {
        name: net.to_string(),
        shape: LabelShape::Input,
        placement: Placement {
            position: anchor,
            rotation: Rotation::Deg0,
        },
        uuid: Some(ids.next_id()),
    }))
}

/// Generates the wires, junctions, labels and no-connect markers that
/// implement `net_model`.
///
/// Nets are routed in lexicographic order, and identifiers are drawn from
/// `ids` in the order elements are returned, so a deterministic source gives
/// deterministic output.
pub fn synthesize(
    net_model: &NetModel,
    existing: &ExistingMarkers,
    options: &RoutingOptions,
    ids: &mut dyn IdSource,
) -> Result<Synthesis, AutowireError> {
    let channels = RoutingChannels::assign(
        net_model.nets.keys().map(String::as_str),
        options.channel_spacing,
    )?;

    let mut anchored = Vec::new();

    for net in net_model.nets.values() {
        let Some(first) = net.endpoints.first() else {
            continue;
        };

        let reused = options
            .reuse_existing_labels
            .then(|| existing.nearest_label(&net.name, first.position))
            .flatten();

        // A reused label is not a pin, so every endpoint needs a route to it
        let (anchor, to_route) = match reused {
            Some(label) => (label, &net.endpoints[..]),
            None => (first.position, &net.endpoints[1..]),
        };

        anchored.push((net, anchor, reused.is_some(), to_route));
    }

    let anchors = anchored.iter().map(|a| a.1).collect::<Vec<_>>();
    let origin = channel_origin(net_model, &anchors, options.channel_spacing);

    let plans = anchored
        .into_iter()
        .map(|(net, anchor, reused, to_route)| {
            let lane = channels.lane(&net.name).unwrap_or_default();
            let channel_y =
                options
                    .channel_base
                    .channel_y(lane, options.channel_spacing, anchor, origin);

            let mut seen = HashSet::new();
            let segments = to_route
                .iter()
                .flat_map(|endpoint| route(endpoint.position, anchor, channel_y))
                .filter(|segment| seen.insert(segment.key()))
                .collect();

            NetPlan {
                net,
                anchor,
                reused,
                channel_y,
                segments,
            }
        })
        .collect::<Vec<_>>();

    check_channel_lines(&plans)?;

    let mut elements = Vec::new();
    let mut diagnostics = Vec::new();
    let mut references = existing.references.clone();

    for plan in &plans {
        let junctions = junction_points(&plan.segments);

        debug!(
            "net `{}`: lane {}, channel at y = {}, {} wires, {} junctions",
            plan.net.name,
            channels.lane(&plan.net.name).unwrap_or_default(),
            plan.channel_y,
            plan.segments.len(),
            junctions.len()
        );

        for segment in &plan.segments {
            elements.push(Element::Wire(Wire {
                start: segment.start,
                end: segment.end,
                uuid: Some(ids.next_id()),
            }));
        }

        for position in junctions {
            elements.push(Element::Junction(Junction {
                position,
                uuid: Some(ids.next_id()),
            }));
        }

        if !plan.reused {
            elements.extend(anchor_marker(
                &plan.net.name,
                plan.anchor,
                options.label_kind(&plan.net.name),
                existing,
                &mut references,
                &mut diagnostics,
                ids,
            ));
        }
    }

    let mut marked = Vec::<Point>::new();

    for pin in &net_model.unassigned_pins {
        if existing.has_no_connect(pin.position) || marked.iter().any(|p| p.same_as(&pin.position)) {
            continue;
        }

        marked.push(pin.position);
        elements.push(Element::NoConnect(NoConnect {
            position: pin.position,
            uuid: Some(ids.next_id()),
        }));
    }

    let routed = plans
        .iter()
        .map(|plan| (plan.net.name.as_str(), &plan.segments[..]))
        .collect::<Vec<_>>();

    verify(net_model, &routed, &mut diagnostics);

    Ok(Synthesis {
        elements,
        channels,
        diagnostics,
    })
}

/// Records `conflict` unless the same one was already found.
fn record_conflict(conflict: Diagnostic, diagnostics: &mut Vec<Diagnostic>) {
    if !diagnostics.contains(&conflict) {
        conflict.record(diagnostics);
    }
}

/// Looks for places where the wires of one net would connect to another net.
fn verify(net_model: &NetModel, routed: &[(&str, &[Segment])], diagnostics: &mut Vec<Diagnostic>) {
    for (index, (net, segments)) in routed.iter().enumerate() {
        for (other_net, other_segments) in &routed[index + 1..] {
            for segment in segments.iter() {
                for other in other_segments.iter() {
                    if let Some(position) = segment.overlap(other) {
                        record_conflict(
                            Diagnostic::RoutingConflict {
                                first_net: net.to_string(),
                                second_net: other_net.to_string(),
                                position,
                                detail: "wires overlap".to_string(),
                            },
                            diagnostics,
                        );
                    } else if let Some(position) = [other.start, other.end]
                        .into_iter()
                        .find(|p| segment.contains(p) && !segment.has_end(p))
                        .or_else(|| {
                            [segment.start, segment.end]
                                .into_iter()
                                .find(|p| other.contains(p))
                        })
                    {
                        record_conflict(
                            Diagnostic::RoutingConflict {
                                first_net: net.to_string(),
                                second_net: other_net.to_string(),
                                position,
                                detail: "wires touch".to_string(),
                            },
                            diagnostics,
                        );
                    }
                }
            }
        }

        for segment in segments.iter() {
            for Endpoint {
                reference,
                pin_number,
                position,
            } in foreign_endpoints(net_model, net)
            {
                if segment.contains(position) {
                    record_conflict(
                        Diagnostic::RoutingConflict {
                            first_net: net.to_string(),
                            second_net: owner(net_model, reference, pin_number).to_string(),
                            position: *position,
                            detail: format!("wire passes through pin {reference}.{pin_number}"),
                        },
                        diagnostics,
                    );
                }
            }
        }
    }
}

fn foreign_endpoints<'a>(net_model: &'a NetModel, net: &'a str) -> impl Iterator<Item = &'a Endpoint> {
    net_model
        .nets
        .values()
        .filter(move |other| other.name != net)
        .flat_map(|other| &other.endpoints)
}

fn owner<'a>(net_model: &'a NetModel, reference: &str, pin_number: &str) -> &'a str {
    net_model
        .nets
        .values()
        .find(|net| {
            net.endpoints
                .iter()
                .any(|e| e.reference == reference && e.pin_number == pin_number)
        })
        .map_or("", |net| net.name.as_str())
}
