//! Minimal EPANET `.inp` reader.
//!
//! Only the sections needed to place sensors and pipes are read:
//! `[JUNCTIONS]`, `[RESERVOIRS]`, `[TANKS]`, `[PIPES]` and `[COORDINATES]`.
//! Text after `;` is a comment. Other sections are skipped.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use aquaguard_core::{Coordinate, Edge, Pipe, Topology};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Junctions,
    Reservoirs,
    Tanks,
    Pipes,
    Coordinates,
    Other,
}

impl Section {
    fn from_header(header: &str) -> Self {
        match header.to_ascii_uppercase().as_str() {
            "JUNCTIONS" => Self::Junctions,
            "RESERVOIRS" => Self::Reservoirs,
            "TANKS" => Self::Tanks,
            "PIPES" => Self::Pipes,
            "COORDINATES" => Self::Coordinates,
            _ => Self::Other,
        }
    }
}

/// Nodes, pipes and coordinates of a network model.
#[derive(Debug, Clone, Default)]
pub struct InpNetwork {
    pub junctions: Vec<String>,
    pub reservoirs: Vec<String>,
    pub tanks: Vec<String>,
    pub pipes: IndexMap<String, Pipe>,
    pub coordinates: IndexMap<String, Coordinate>,
}

impl InpNetwork {
    pub fn node_count(&self) -> usize {
        self.junctions.len() + self.reservoirs.len() + self.tanks.len()
    }

    /// Pipes joining two sensors directly, as graph edges with
    /// `[length, diameter, roughness]` attributes.
    pub fn sensor_edges(&self, sensors: &[String]) -> Vec<Edge> {
        let is_sensor = |id: &str| sensors.iter().any(|s| s == id);
        self.pipes
            .values()
            .filter(|p| is_sensor(&p.start_node) && is_sensor(&p.end_node))
            .map(|p| Edge {
                source: p.start_node.clone(),
                target: p.end_node.clone(),
                attributes: vec![p.length, p.diameter, p.roughness],
            })
            .collect()
    }

    /// Topology over the given sensors: all coordinates and pipes, plus the
    /// sensor-to-sensor pipes as edges.
    pub fn topology(&self, sensors: &[String]) -> Topology {
        Topology {
            coordinates: self.coordinates.clone(),
            edges: self.sensor_edges(sensors),
            pipes: self.pipes.clone(),
        }
    }
}

pub fn read_inp(path: &Path) -> Result<InpNetwork> {
    let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let network = parse_inp(&text, &path.display().to_string())?;
    info!(
        path = %path.display(),
        nodes = network.node_count(),
        pipes = network.pipes.len(),
        coordinates = network.coordinates.len(),
        "Network model loaded"
    );
    Ok(network)
}

pub fn parse_inp(text: &str, label: &str) -> Result<InpNetwork> {
    let mut network = InpNetwork::default();
    let mut section = Section::Other;

    for (row, raw) in text.lines().enumerate() {
        let line = row + 1;
        let content = raw.split(';').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        if let Some(header) = content.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if header.eq_ignore_ascii_case("END") {
                break;
            }
            section = Section::from_header(header.trim());
            continue;
        }

        let fields: Vec<&str> = content.split_whitespace().collect();
        let number = |i: usize| -> Result<f64> {
            let raw = fields.get(i).copied().unwrap_or_default();
            raw.parse()
                .map_err(|_| IngestError::parse(label, line, format!("not a number: {raw:?}")))
        };
        match section {
            Section::Junctions => network.junctions.push(fields[0].to_string()),
            Section::Reservoirs => network.reservoirs.push(fields[0].to_string()),
            Section::Tanks => network.tanks.push(fields[0].to_string()),
            Section::Pipes => {
                if fields.len() < 6 {
                    return Err(IngestError::parse(
                        label,
                        line,
                        "pipe needs id, two nodes, length, diameter and roughness",
                    ));
                }
                let pipe = Pipe {
                    id: fields[0].to_string(),
                    start_node: fields[1].to_string(),
                    end_node: fields[2].to_string(),
                    length: number(3)?,
                    diameter: number(4)?,
                    roughness: number(5)?,
                };
                network.pipes.insert(pipe.id.clone(), pipe);
            }
            Section::Coordinates => {
                if fields.len() < 3 {
                    return Err(IngestError::parse(label, line, "coordinate needs node, x and y"));
                }
                network
                    .coordinates
                    .insert(fields[0].to_string(), Coordinate::new(number(1)?, number(2)?));
            }
            Section::Other => {}
        }
    }

    let placed = network
        .pipes
        .values()
        .filter(|p| {
            network.coordinates.contains_key(&p.start_node)
                && network.coordinates.contains_key(&p.end_node)
        })
        .count();
    debug!(file = label, placed, "Pipes with both endpoints placed");
    Ok(network)
}
