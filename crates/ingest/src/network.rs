//! Sensor graph edge lists and node coordinate tables.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use aquaguard_core::{Coordinate, Edge};

use crate::error::{IngestError, Result};
use crate::scada::parse_decimal;

const ATTRIBUTE_COLUMNS: [&str; 3] = ["Length", "Diameter", "Roughness"];

/// Read an edge list with `Node1,Node2` and optional
/// `Length,Diameter,Roughness` columns.
///
/// Endpoints may be sensor names or 1-based positions in `nodes`.
pub fn read_edges(path: &Path, nodes: &[String]) -> Result<Vec<Edge>> {
    let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let edges = parse_edges(&text, &path.display().to_string(), nodes)?;
    info!(
        path = %path.display(),
        edges = edges.len(),
        attributes = edges.first().map_or(0, |e| e.attributes.len()),
        "Edge list loaded"
    );
    Ok(edges)
}

pub fn parse_edges(text: &str, label: &str, nodes: &[String]) -> Result<Vec<Edge>> {
    let mut rdr = reader(text);
    let headers = header_names(&mut rdr)?;
    let source = column(&headers, "Node1", label)?;
    let target = column(&headers, "Node2", label)?;
    let attributes: Option<Vec<usize>> = ATTRIBUTE_COLUMNS
        .iter()
        .map(|name| find(&headers, name))
        .collect();
    if attributes.is_none() {
        debug!(file = label, "Edge list has no pipe attributes");
    }

    let mut edges = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let line = row + 2;
        let field = |i: usize| record.get(i).unwrap_or_default();
        let attributes = match &attributes {
            Some(cols) => cols
                .iter()
                .map(|&i| match parse_decimal(field(i)) {
                    Some(v) if v.is_finite() => Ok(v),
                    _ => Err(IngestError::parse(
                        label,
                        line,
                        format!("{}: not a number: {:?}", headers[i], field(i)),
                    )),
                })
                .collect::<Result<Vec<f64>>>()?,
            None => Vec::new(),
        };
        edges.push(Edge {
            source: resolve_node(field(source), nodes),
            target: resolve_node(field(target), nodes),
            attributes,
        });
    }
    Ok(edges)
}

/// Map a node reference to a sensor name: exact names first, then 1-based
/// positions. Anything else is kept verbatim.
fn resolve_node(raw: &str, nodes: &[String]) -> String {
    if nodes.iter().any(|n| n == raw) {
        return raw.to_string();
    }
    let position = raw
        .parse::<usize>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 1.0)
                .map(|v| v as usize)
        });
    match position {
        Some(k) if (1..=nodes.len()).contains(&k) => nodes[k - 1].clone(),
        _ => raw.to_string(),
    }
}

/// Read a `Node,X,Y` coordinate table.
pub fn read_coordinates(path: &Path) -> Result<IndexMap<String, Coordinate>> {
    let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let coordinates = parse_coordinates(&text, &path.display().to_string())?;
    info!(path = %path.display(), nodes = coordinates.len(), "Coordinates loaded");
    Ok(coordinates)
}

pub fn parse_coordinates(text: &str, label: &str) -> Result<IndexMap<String, Coordinate>> {
    let mut rdr = reader(text);
    let headers = header_names(&mut rdr)?;
    let node = column(&headers, "Node", label)?;
    let x = column(&headers, "X", label)?;
    let y = column(&headers, "Y", label)?;

    let mut coordinates = IndexMap::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let line = row + 2;
        let number = |i: usize| {
            let raw = record.get(i).unwrap_or_default();
            parse_decimal(raw)
                .filter(|v| v.is_finite())
                .ok_or_else(|| IngestError::parse(label, line, format!("not a coordinate: {raw:?}")))
        };
        let name = record.get(node).unwrap_or_default().to_string();
        coordinates.insert(name, Coordinate::new(number(x)?, number(y)?));
    }
    Ok(coordinates)
}

/// `;`-delimited when the header line contains one, `,` otherwise.
fn reader(text: &str) -> csv::Reader<&[u8]> {
    let header = text.lines().next().unwrap_or_default();
    let delimiter = if header.contains(';') { b';' } else { b',' };
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn header_names(rdr: &mut csv::Reader<&[u8]>) -> Result<Vec<String>> {
    Ok(rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect())
}

fn find(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn column(headers: &[String], name: &str, label: &str) -> Result<usize> {
    find(headers, name).ok_or_else(|| IngestError::MissingColumn {
        file: label.to_string(),
        column: name.to_string(),
    })
}
