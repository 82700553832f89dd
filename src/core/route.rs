//! Routing requests and routing-service responses
//!
//! The routing service answers with one to three route alternatives, each
//! carrying the carriageway-level road references the route runs along.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Issue, Result};
use crate::core::position::{round_offset, LinearInterval, LinkSequenceId};

/// A route stop in projected coordinates (passed through to the routing service as-is)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub x: f64,
    pub y: f64,
}

impl Stop {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Stop {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::ValidationError(format!("'{s}' is not a coordinate pair 'x,y'"));
        let (x, y) = s.split_once(',').ok_or_else(invalid)?;
        let x = x.trim().parse::<f64>().map_err(|_| invalid())?;
        let y = y.trim().parse::<f64>().map_err(|_| invalid())?;
        Ok(Stop::new(x, y))
    }
}

/// A request for one route through two or more stops
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub stops: Vec<Stop>,
    /// Ask the routing service for alternative routes
    pub alternatives: bool,
}

impl RouteRequest {
    /// Create a request, rejecting fewer than 2 stops
    pub fn new(stops: Vec<Stop>) -> Result<Self> {
        if stops.len() < 2 {
            return Err(Error::ValidationError(format!(
                "Coordinate list must have at least 2 points, got {}",
                stops.len()
            )));
        }
        Ok(Self {
            stops,
            alternatives: false,
        })
    }

    pub fn with_alternatives(mut self, alternatives: bool) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// The `stops` query parameter: `x,y;x,y;...`
    pub fn stops_param(&self) -> String {
        self.stops
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// One route alternative with its carriageway-level references
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAlternative {
    pub index: usize,
    pub references: Vec<LinearInterval>,
}

/// All route alternatives returned for one request
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoutePlan {
    pub alternatives: Vec<RouteAlternative>,
    /// Alternatives left out because of malformed references
    pub issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    routes: Option<Vec<RawRoute>>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    #[serde(rename = "nvdbReferenceLinks", default)]
    reference_links: Vec<RawReferenceLink>,
}

#[derive(Debug, Deserialize)]
struct RawReferenceLink {
    #[serde(rename = "nvdbReferenceId")]
    id: Option<LinkSequenceId>,
    #[serde(rename = "fromLength")]
    from: Option<f64>,
    #[serde(rename = "toLength")]
    to: Option<f64>,
}

impl RoutePlan {
    /// Parse a routing-service JSON response. Offsets are rounded to 8 decimals.
    ///
    /// An alternative with a malformed reference is left out and recorded in
    /// [`RoutePlan::issues`]; parsing fails only when no alternative is usable.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawResponse = serde_json::from_value(value)?;
        let routes = raw.routes.ok_or_else(|| {
            Error::ValidationError("routing response has no 'routes' element".to_string())
        })?;

        let mut plan = Self::default();
        let mut first_error = None;
        for (index, route) in routes.into_iter().enumerate() {
            match parse_references(index, route) {
                Ok(references) => plan.alternatives.push(RouteAlternative { index, references }),
                Err(e) => {
                    plan.issues.push(Issue::error(format!("route {index}"), &e));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if plan.alternatives.is_empty() => Err(e),
            _ => Ok(plan),
        }
    }

    /// Distinct link sequence ids referenced by any alternative
    pub fn distinct_sequence_ids(&self) -> BTreeSet<LinkSequenceId> {
        self.alternatives
            .iter()
            .flat_map(|a| a.references.iter().map(|r| r.link_sequence_id))
            .collect()
    }
}

fn parse_references(index: usize, route: RawRoute) -> Result<Vec<LinearInterval>> {
    let mut references = Vec::with_capacity(route.reference_links.len());
    for (n, link) in route.reference_links.into_iter().enumerate() {
        let missing = |field: &str| {
            Error::ValidationError(format!("route {index} reference {n} is missing '{field}'"))
        };
        let id = link.id.ok_or_else(|| missing("nvdbReferenceId"))?;
        let from = link.from.ok_or_else(|| missing("fromLength"))?;
        let to = link.to.ok_or_else(|| missing("toLength"))?;
        references.push(LinearInterval::new(id, round_offset(from), round_offset(to)));
    }
    Ok(references)
}
