//! Tunnel endpoint extraction from switch output
//!
//! Two sources are understood:
//!
//! - The JSON Interface table (`ovs-vsctl --format=json list Interface`).
//!   Every row whose `options` map carries `remote_ip` is a tunnel.
//! - The `ovs-vsctl show` dump, used when the structured query is not
//!   available. Its grammar for a tunnel interface is fixed:
//!
//! ```text
//!             Interface <name>          <- declaration, two lines above
//!                 type: <type>
//!                 options: {..., remote_ip=<ip>, ...}
//! ```
//!
//!   Names and values may be double-quoted. A `remote_ip=` line whose line
//!   two above is not an `Interface` declaration is a parse error.

use crate::error::{OverlayError, Result};
use crate::tunnel::TunnelEndpoint;
use serde_json::Value;

const REMOTE_IP_KEY: &str = "remote_ip=";

/// Parse the `ovs-vsctl show` dump
pub fn parse_show_dump(dump: &str) -> Result<Vec<TunnelEndpoint>> {
    let lines: Vec<&str> = dump.lines().collect();
    let mut endpoints = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(pos) = line.find(REMOTE_IP_KEY) else {
            continue;
        };

        let line_no = idx + 1;
        let decl = idx
            .checked_sub(2)
            .map(|i| lines[i].trim())
            .ok_or_else(|| parse_error(line_no, "remote_ip before any Interface declaration"))?;

        let mut fields = decl.split_whitespace();
        let port_name = match (fields.next(), fields.next()) {
            (Some("Interface"), Some(name)) => unquote(name),
            _ => {
                return Err(parse_error(
                    line_no,
                    format!("expected Interface declaration two lines above, found {:?}", decl),
                ))
            }
        };

        let rest = &line[pos + REMOTE_IP_KEY.len()..];
        let value = rest
            .split(|c| c == ',' || c == '}')
            .next()
            .map(unquote)
            .unwrap_or_default();

        if port_name.is_empty() || value.is_empty() {
            return Err(parse_error(line_no, "empty interface name or remote_ip"));
        }

        endpoints.push(TunnelEndpoint::new(port_name, value));
    }

    Ok(endpoints)
}

/// Parse the JSON Interface table
pub fn parse_interface_table(json: &str) -> Result<Vec<TunnelEndpoint>> {
    let table: Value = serde_json::from_str(json)?;

    let headings = table
        .get("headings")
        .and_then(Value::as_array)
        .ok_or_else(|| OverlayError::Serialization("Interface table without headings".into()))?;
    let column = |name: &str| headings.iter().position(|h| h.as_str() == Some(name));
    let (name_col, options_col) = match (column("name"), column("options")) {
        (Some(n), Some(o)) => (n, o),
        _ => {
            return Err(OverlayError::Serialization(
                "Interface table lacks name/options columns".into(),
            ))
        }
    };

    let rows = table
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| OverlayError::Serialization("Interface table without data".into()))?;

    let mut endpoints = Vec::new();
    for row in rows {
        let Some(name) = row.get(name_col).and_then(Value::as_str) else {
            continue;
        };
        if let Some(remote_ip) = row.get(options_col).and_then(|o| map_get(o, "remote_ip")) {
            endpoints.push(TunnelEndpoint::new(name, remote_ip));
        }
    }

    Ok(endpoints)
}

/// Look up a key in an OVSDB `["map", [[k, v], ...]]` value
fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    let pair = value.as_array()?;
    if pair.first()?.as_str()? != "map" {
        return None;
    }

    pair.get(1)?.as_array()?.iter().find_map(|entry| {
        let kv = entry.as_array()?;
        if kv.first()?.as_str()? == key {
            kv.get(1)?.as_str()
        } else {
            None
        }
    })
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn parse_error(line: usize, message: impl Into<String>) -> OverlayError {
    OverlayError::DumpParse {
        line,
        message: message.into(),
    }
}
