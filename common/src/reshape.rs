use std::collections::BTreeMap;

use itertools::Itertools;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ReshapeError {
    #[error("Missing or empty header line")]
    MissingHeader,
    #[error("Missing data row")]
    MissingData,
    #[error("Row {row}: need at least {need} fields, found {found}")]
    ShortRow {
        row: usize,
        need: usize,
        found: usize,
    },
    #[error("Row {row}: client {client}: cannot parse '{token}' as a number")]
    BadNumber {
        row: usize,
        client: u64,
        token: String,
    },
    #[error("Unrecognized measurement kind in column '{column}'")]
    UnknownKind { column: String },
    #[error("Bad column pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Which time unit the column names encode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    #[default]
    Wall,
    User,
}

impl Unit {
    fn token(&self) -> &'static str {
        match self {
            Unit::Wall => "wall",
            Unit::User => "user",
        }
    }
}

/// Plain passes the matched `_avg` values through as strings; Sum parses the
/// matched `_sum` values and appends their total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plain,
    Sum,
}

impl Mode {
    fn agg_token(&self) -> &'static str {
        match self {
            Mode::Plain => "avg",
            Mode::Sum => "sum",
        }
    }
}

/// Column positions for one client, resolved once from the header.
/// Only clients with both slots resolved are ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSlots {
    pub label: String,
    pub read: usize,
    pub decrypt: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClientColumns {
    pub clients: BTreeMap<u64, ClientSlots>,
}

#[derive(Debug, Clone)]
pub struct ClientRow {
    pub id: u64,
    pub label: String,
    pub fields: Vec<String>,
}

/// Matches every header cell against `Client_<N>_<kind>_<unit>_<agg>` and
/// records the cell positions per client. Kind tokens other than
/// read/decrypt are dropped (an error in strict mode); clients resolving
/// only one of the two slots are excluded from the table.
pub fn resolve_columns(
    header: &[&str],
    unit: Unit,
    mode: Mode,
    strict: bool,
) -> Result<ClientColumns, ReshapeError> {
    let pattern = Regex::new(&format!(
        r"(Client_(\d+))_([a-z]+)_{}_{}",
        unit.token(),
        mode.agg_token()
    ))?;

    let mut slots: BTreeMap<u64, (String, [Option<usize>; 2])> = BTreeMap::new();
    for (idx, cell) in header.iter().enumerate() {
        let Some(cap) = pattern.captures(cell) else {
            continue;
        };
        let Some(id) = cap.get(2).and_then(|m| m.as_str().parse::<u64>().ok()) else {
            debug!("Skipping column '{cell}': client id out of range");
            continue;
        };
        let slot = match cap.get(3).map_or("", |m| m.as_str()) {
            "read" => 0,
            "decrypt" => 1,
            other => {
                if strict {
                    return Err(ReshapeError::UnknownKind {
                        column: (*cell).to_owned(),
                    });
                }
                debug!("Ignoring column '{cell}': unrecognized kind '{other}'");
                continue;
            }
        };
        let label = cap.get(1).map_or("", |m| m.as_str()).to_owned();
        slots.entry(id).or_insert((label, [None, None])).1[slot] = Some(idx);
    }

    let mut clients = BTreeMap::new();
    for (id, (label, resolved)) in slots {
        match resolved {
            [Some(read), Some(decrypt)] => {
                clients.insert(
                    id,
                    ClientSlots {
                        label,
                        read,
                        decrypt,
                    },
                );
            }
            _ => warn!("Client {id} resolved only one of read/decrypt, excluding it"),
        }
    }
    Ok(ClientColumns { clients })
}

/// Projects one data row: per client in ascending id order, the read and
/// decrypt tokens at the resolved positions, plus the 6-decimal total in
/// sum mode. `row` is the 1-based data row number, used for error reports.
pub fn project_row(
    tokens: &[&str],
    columns: &ClientColumns,
    mode: Mode,
    row: usize,
) -> Result<Vec<ClientRow>, ReshapeError> {
    let mut out = Vec::with_capacity(columns.clients.len());
    for (&id, slots) in &columns.clients {
        let fetch = |pos: usize| {
            tokens.get(pos).copied().ok_or(ReshapeError::ShortRow {
                row,
                need: pos + 1,
                found: tokens.len(),
            })
        };
        let read = fetch(slots.read)?;
        let decrypt = fetch(slots.decrypt)?;
        let fields = match mode {
            Mode::Plain => vec![read.to_owned(), decrypt.to_owned()],
            Mode::Sum => {
                let parse = |token: &str| {
                    token
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| ReshapeError::BadNumber {
                            row,
                            client: id,
                            token: token.to_owned(),
                        })
                };
                let total = parse(read)? + parse(decrypt)?;
                vec![read.to_owned(), decrypt.to_owned(), format!("{total:.6}")]
            }
        };
        out.push(ClientRow {
            id,
            label: slots.label.clone(),
            fields,
        });
    }
    Ok(out)
}

fn header_line(unit: Unit, mode: Mode) -> String {
    let (u, a) = (unit.token(), mode.agg_token());
    match mode {
        Mode::Plain => format!("label, read_{u}_{a}, decrypt_{u}_{a}"),
        Mode::Sum => format!("label, read_{u}_{a}, decrypt_{u}_{a}, total"),
    }
}

fn parse_header<'a>(input: &'a str) -> Result<(Vec<&'a str>, std::str::Lines<'a>), ReshapeError> {
    let mut lines = input.lines();
    let header = lines
        .next()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .ok_or(ReshapeError::MissingHeader)?;
    Ok((header.split(',').map(str::trim).collect(), lines))
}

/// Streaming reshape: one output row per (client, round), rounds in file
/// order. Sum-mode labels carry a 1-based `_<round>` suffix.
pub fn reshape(
    input: &str,
    unit: Unit,
    mode: Mode,
    strict: bool,
) -> Result<Vec<String>, ReshapeError> {
    let (header, lines) = parse_header(input)?;
    let columns = resolve_columns(&header, unit, mode, strict)?;
    if columns.clients.is_empty() {
        warn!("No client columns matched the header");
    }

    let mut out = vec![header_line(unit, mode)];
    let mut round = 0usize;
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        round += 1;
        let tokens: Vec<&str> = line.split(',').collect();
        for client in project_row(&tokens, &columns, mode, round)? {
            out.push(match mode {
                Mode::Sum => format!("{}_{round}, {}", client.label, client.fields.iter().join(", ")),
                Mode::Plain => format!("{},{}", client.label, client.fields.join(",")),
            });
        }
    }
    Ok(out)
}

/// Accumulate-then-flush reshape (sum projection): one wide output row per
/// client, with every round's (read, decrypt, total) tuple concatenated in
/// arrival order.
pub fn accumulate(input: &str, unit: Unit, strict: bool) -> Result<Vec<String>, ReshapeError> {
    let (header, lines) = parse_header(input)?;
    let columns = resolve_columns(&header, unit, Mode::Sum, strict)?;
    if columns.clients.is_empty() {
        warn!("No client columns matched the header");
    }

    let mut acc: BTreeMap<u64, (String, Vec<String>)> = BTreeMap::new();
    let mut round = 0usize;
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        round += 1;
        let tokens: Vec<&str> = line.split(',').collect();
        for client in project_row(&tokens, &columns, Mode::Sum, round)? {
            acc.entry(client.id)
                .or_insert_with(|| (client.label.clone(), Vec::new()))
                .1
                .extend(client.fields);
        }
    }

    let mut out = vec![header_line(unit, Mode::Sum)];
    for (_, (label, fields)) in acc {
        out.push(format!("{label},{}", fields.iter().join(",")));
    }
    Ok(out)
}
