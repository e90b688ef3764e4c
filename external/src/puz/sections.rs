//! Extension sections that follow the notes string.
//!
//! Each one is `name[4] length:u16 checksum:u16 data[length] NUL`. Known
//! sections are decoded into the puzzle; anything else is carried verbatim.

use crate::error::{ExternalError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use xword_core::square::normalize_entry;
use xword_core::{
    Grid, LoadWarning, Puzzle, Section, SquareFlags, TextEncoding, Timer, checksum_region,
};

const GRBS: [u8; 4] = *b"GRBS";
const RTBL: [u8; 4] = *b"RTBL";
const LTIM: [u8; 4] = *b"LTIM";
const GEXT: [u8; 4] = *b"GEXT";
const RUSR: [u8; 4] = *b"RUSR";
const CHKD: [u8; 4] = *b"CHKD";

/// Written in this order, before any unknown sections.
const KNOWN: [[u8; 4]; 6] = [GRBS, RTBL, LTIM, GEXT, RUSR, CHKD];

/// Read sections until the end of the input. Damaged sections are skipped
/// with a warning.
pub(crate) fn read_sections(r: &mut Cursor<&[u8]>, warnings: &mut Vec<LoadWarning>) -> Vec<Section> {
    let mut sections = Vec::new();
    loop {
        let remaining = r.get_ref().len() - r.position() as usize;
        if remaining == 0 {
            break;
        }
        match read_section(r) {
            Ok(Some((section, cksum))) => {
                if checksum_region(&section.data, 0) == cksum {
                    debug!("read {} section ({} bytes)", section.name_str(), section.data.len());
                    sections.push(section);
                } else {
                    warn!("checksum does not match for {} section", section.name_str());
                    warnings.push(LoadWarning::SectionChecksum(section.name_str()));
                }
            }
            Ok(None) => {
                warn!("ignoring {remaining} bytes after the last section");
                warnings.push(LoadWarning::TrailingData(remaining));
                break;
            }
            Err((name, reason)) => {
                warn!("{name} section could not be read: {reason}");
                warnings.push(LoadWarning::SectionDamaged { name, reason });
                break;
            }
        }
    }
    sections
}

type ReadFailure = (String, String);

fn read_section(r: &mut Cursor<&[u8]>) -> std::result::Result<Option<(Section, u16)>, ReadFailure> {
    let mut name = [0u8; 4];
    if r.read_exact(&mut name).is_err() || !name.iter().all(u8::is_ascii_graphic) {
        return Ok(None);
    }
    let shown = String::from_utf8_lossy(&name).into_owned();
    let fail = |reason: &str| (shown.clone(), reason.to_string());

    let length = r.read_u16::<LittleEndian>().map_err(|_| fail("truncated header"))?;
    let cksum = r.read_u16::<LittleEndian>().map_err(|_| fail("truncated header"))?;
    let mut data = vec![0u8; usize::from(length)];
    r.read_exact(&mut data).map_err(|_| fail("truncated data"))?;
    match r.read_u8() {
        Ok(0) => Ok(Some((Section::new(name, data), cksum))),
        _ => Err(fail("missing nul terminator")),
    }
}

/// Decode the known sections into the puzzle and keep the rest as opaque data.
pub(crate) fn apply_sections(
    puzzle: &mut Puzzle,
    sections: Vec<Section>,
    encoding: TextEncoding,
    warnings: &mut Vec<LoadWarning>,
) {
    let mut known: HashMap<[u8; 4], Vec<u8>> = HashMap::new();
    let mut order = Vec::new();
    let mut opaque = Vec::new();
    for section in sections {
        if KNOWN.contains(&section.name) && !known.contains_key(&section.name) {
            order.push(section.name);
            known.insert(section.name, section.data);
        } else {
            opaque.push(section);
        }
    }

    let mut applied: HashMap<[u8; 4], Vec<u8>> = HashMap::new();
    let mut finish = |name: [u8; 4],
                      data: Vec<u8>,
                      result: std::result::Result<(), String>,
                      opaque: &mut Vec<Section>| {
        match result {
            Ok(()) => {
                applied.insert(name, data);
            }
            Err(reason) => {
                let section = Section::new(name, data);
                warn!("{} section could not be read: {reason}", section.name_str());
                warnings.push(LoadWarning::SectionDamaged {
                    name: section.name_str(),
                    reason,
                });
                opaque.push(section);
            }
        }
    };

    if let Some(data) = known.remove(&GEXT) {
        let result = apply_gext(&mut puzzle.grid, &data);
        finish(GEXT, data, result, &mut opaque);
    }
    if let Some(data) = known.remove(&CHKD) {
        let result = apply_chkd(&mut puzzle.grid, &data);
        finish(CHKD, data, result, &mut opaque);
    }
    if let Some(data) = known.remove(&LTIM) {
        let result = decode_ltim(&data).map(|timer| puzzle.timer = Some(timer));
        finish(LTIM, data, result, &mut opaque);
    }
    if let Some(data) = known.remove(&RUSR) {
        let result = apply_rusr(&mut puzzle.grid, &data, encoding);
        finish(RUSR, data, result, &mut opaque);
    }
    match (known.remove(&RTBL), known.remove(&GRBS)) {
        (Some(table), Some(rebus)) => {
            let result = apply_rebus(&mut puzzle.grid, &table, &rebus, encoding);
            finish(RTBL, table, result.clone(), &mut opaque);
            finish(GRBS, rebus, result, &mut opaque);
        }
        (Some(table), None) => opaque.push(Section::new(RTBL, table)),
        (None, Some(rebus)) => opaque.push(Section::new(GRBS, rebus)),
        (None, None) => {}
    }

    puzzle.format.decoded = order
        .into_iter()
        .filter_map(|name| applied.remove(&name).map(|data| Section::new(name, data)))
        .collect();
    puzzle.format.sections = opaque;
}

fn check_len(grid: &Grid, data: &[u8]) -> std::result::Result<(), String> {
    if data.len() != grid.len() {
        return Err(format!("expected {} bytes, found {}", grid.len(), data.len()));
    }
    Ok(())
}

fn apply_gext(grid: &mut Grid, data: &[u8]) -> std::result::Result<(), String> {
    check_len(grid, data)?;
    for (i, byte) in data.iter().enumerate() {
        let Some(square) = grid.square(i) else { continue };
        let kept = square.flags().bits() & !SquareFlags::GEXT_MASK;
        let flags = SquareFlags::from_bits_retain(kept | u16::from(*byte));
        grid.set_flag(i, flags).map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn apply_chkd(grid: &mut Grid, data: &[u8]) -> std::result::Result<(), String> {
    check_len(grid, data)?;
    for (i, byte) in data.iter().enumerate() {
        if *byte != 0 {
            grid.add_flag(i, SquareFlags::MARKED).map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

/// `"<seconds>,<state>"`, where state 0 means the timer is running.
fn decode_ltim(data: &[u8]) -> std::result::Result<Timer, String> {
    let text = std::str::from_utf8(data).map_err(|_| "timer is not text".to_string())?;
    let (seconds, state) = text
        .split_once(',')
        .ok_or_else(|| "missing ',' in timer".to_string())?;
    let seconds = seconds
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("incorrect time value {seconds:?}"))?;
    let state = state
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("incorrect timer state {state:?}"))?;
    Ok(Timer {
        seconds,
        paused: state != 0,
    })
}

fn apply_rusr(grid: &mut Grid, data: &[u8], encoding: TextEncoding) -> std::result::Result<(), String> {
    let Some(body) = data.strip_suffix(&[0]) else {
        return Err("missing final nul".to_string());
    };
    let entries: Vec<String> = body.split(|b| *b == 0).map(|raw| encoding.decode(raw)).collect();
    if entries.len() != grid.len() {
        return Err(format!("expected {} entries, found {}", grid.len(), entries.len()));
    }
    for (i, entry) in entries.iter().enumerate() {
        if entry.is_empty() {
            continue;
        }
        normalize_entry(entry).map_err(|err| err.to_string())?;
        if grid.square(i).is_some_and(|square| square.is_black()) {
            return Err(format!("entry {entry:?} on a black square"));
        }
    }
    for (i, entry) in entries.iter().enumerate() {
        if !entry.is_empty() {
            grid.set_text(i, entry).map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

/// RTBL holds `" 0:HEART;"` entries, keyed here by index plus one as GRBS
/// refers to them.
fn parse_rebus_table(
    table: &[u8],
    encoding: TextEncoding,
) -> std::result::Result<HashMap<u16, String>, String> {
    let mut entries = HashMap::new();
    for entry in table.split(|b| *b == b';').filter(|entry| !entry.is_empty()) {
        let colon = entry
            .iter()
            .position(|b| *b == b':')
            .ok_or_else(|| "missing ':' in rebus table".to_string())?;
        let index = std::str::from_utf8(&entry[..colon])
            .ok()
            .and_then(|index| index.trim().parse::<u8>().ok())
            .ok_or_else(|| "bad rebus table index".to_string())?;
        let value = normalize_entry(&encoding.decode(&entry[colon + 1..]))
            .map_err(|err| err.to_string())?;
        entries.insert(u16::from(index) + 1, value);
    }
    Ok(entries)
}

fn apply_rebus(
    grid: &mut Grid,
    table: &[u8],
    rebus: &[u8],
    encoding: TextEncoding,
) -> std::result::Result<(), String> {
    check_len(grid, rebus)?;
    let entries = parse_rebus_table(table, encoding)?;

    let mut solutions = Vec::new();
    for (i, byte) in rebus.iter().enumerate() {
        if *byte == 0 {
            continue;
        }
        let value = entries
            .get(&u16::from(*byte))
            .ok_or_else(|| format!("rebus index {} not in table", byte - 1))?;
        let plain = grid
            .square(i)
            .filter(|square| square.is_white())
            .and_then(|square| square.plain_solution())
            .ok_or_else(|| "rebus on a black square".to_string())?;
        solutions.push((i, value.clone(), plain));
    }
    for (i, value, plain) in solutions {
        grid.set_rebus_solution(i, &value, plain)
            .map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn push_section(out: &mut Vec<u8>, name: [u8; 4], data: &[u8]) -> Result<()> {
    let length = u16::try_from(data.len()).map_err(|_| {
        ExternalError::Conversion(format!(
            "{} section is too large",
            String::from_utf8_lossy(&name)
        ))
    })?;
    out.extend_from_slice(&name);
    out.write_u16::<LittleEndian>(length)?;
    out.write_u16::<LittleEndian>(checksum_region(data, 0))?;
    out.extend_from_slice(data);
    out.push(0);
    Ok(())
}

/// Whether a loaded GRBS/RTBL pair still describes the grid's rebus squares.
fn rebus_matches(grid: &Grid, rebus: &[u8], table: &[u8], encoding: TextEncoding) -> bool {
    let Ok(entries) = parse_rebus_table(table, encoding) else {
        return false;
    };
    rebus.len() == grid.len()
        && grid.squares().iter().zip(rebus).all(|(square, byte)| match byte {
            0 => !square.has_solution_rebus(),
            byte => entries
                .get(&u16::from(*byte))
                .is_some_and(|value| square.is_white() && square.solution() == value),
        })
}

fn encode_rebus(
    grid: &Grid,
    loaded: Option<(&[u8], &[u8])>,
    encoding: TextEncoding,
) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    if let Some((rebus, table)) = loaded {
        if rebus_matches(grid, rebus, table, encoding) {
            return Ok(Some((rebus.to_vec(), table.to_vec())));
        }
    }

    // Table indices follow first appearance in across order.
    let mut table: Vec<&str> = Vec::new();
    let mut rebus = Vec::with_capacity(grid.len());
    for square in grid.squares() {
        if !square.has_solution_rebus() {
            rebus.push(0);
            continue;
        }
        let index = match table.iter().position(|value| *value == square.solution()) {
            Some(index) => index,
            None => {
                table.push(square.solution());
                table.len() - 1
            }
        };
        let byte = u8::try_from(index + 1)
            .map_err(|_| ExternalError::Conversion("too many rebus entries".to_string()))?;
        rebus.push(byte);
    }
    if table.is_empty() {
        return Ok(None);
    }
    let mut rtbl = Vec::new();
    for (index, value) in table.iter().enumerate() {
        rtbl.extend_from_slice(format!("{index:>2}:").as_bytes());
        rtbl.extend(encoding.encode(value)?);
        rtbl.push(b';');
    }
    Ok(Some((rebus, rtbl)))
}

fn encode_ltim(timer: Option<Timer>, loaded: Option<&[u8]>) -> Option<Vec<u8>> {
    let timer = timer?;
    if let Some(data) = loaded.filter(|data| decode_ltim(data).ok() == Some(timer)) {
        return Some(data.to_vec());
    }
    Some(format!("{},{}", timer.seconds, u8::from(timer.paused)).into_bytes())
}

/// Black squares take no flags, so their bytes come from the loaded section.
fn encode_gext(grid: &Grid, loaded: Option<&[u8]>) -> Option<Vec<u8>> {
    let loaded = loaded.filter(|data| data.len() == grid.len());
    let gext: Vec<u8> = grid
        .squares()
        .iter()
        .enumerate()
        .map(|(i, square)| match loaded.and_then(|data| data.get(i)) {
            Some(byte) if square.is_black() => *byte,
            _ => square.flags().gext_byte(),
        })
        .collect();
    (loaded.is_some() || gext.iter().any(|byte| *byte != 0)).then_some(gext)
}

fn encode_rusr(grid: &Grid, loaded: Option<&[u8]>, encoding: TextEncoding) -> Result<Option<Vec<u8>>> {
    let entries: Option<Vec<&[u8]>> = loaded
        .and_then(|data| data.strip_suffix(&[0]))
        .map(|body| body.split(|b| *b == 0).collect::<Vec<_>>())
        .filter(|entries| entries.len() == grid.len());

    let mut rusr = Vec::new();
    let mut any = false;
    for (i, square) in grid.squares().iter().enumerate() {
        let kept = entries
            .as_ref()
            .and_then(|entries| entries.get(i).copied())
            .filter(|entry| {
                !entry.is_empty()
                    && normalize_entry(&encoding.decode(entry)).is_ok_and(|text| text == square.text())
            });
        if let Some(entry) = kept {
            rusr.extend_from_slice(entry);
            any = true;
        } else if square.has_text_rebus() {
            rusr.extend(encoding.encode(square.text())?);
            any = true;
        }
        rusr.push(0);
    }
    Ok((entries.is_some() || any).then_some(rusr))
}

fn encode_chkd(grid: &Grid, loaded: Option<&[u8]>) -> Option<Vec<u8>> {
    let loaded = loaded.filter(|data| data.len() == grid.len());
    let chkd: Vec<u8> = grid
        .squares()
        .iter()
        .enumerate()
        .map(|(i, square)| {
            let byte = loaded.and_then(|data| data.get(i)).copied().unwrap_or(0);
            match (square.is_black(), square.has_flag(SquareFlags::MARKED)) {
                (true, _) => byte,
                (false, true) => byte.max(1),
                (false, false) => 0,
            }
        })
        .collect();
    let marked = grid.squares().iter().any(|square| square.has_flag(SquareFlags::MARKED));
    (loaded.is_some() || marked).then_some(chkd)
}

pub(crate) fn write_sections(out: &mut Vec<u8>, puzzle: &Puzzle, encoding: TextEncoding) -> Result<()> {
    let grid = &puzzle.grid;
    let decoded = &puzzle.format.decoded;
    let loaded = |name: [u8; 4]| {
        decoded
            .iter()
            .find(|section| section.name == name)
            .map(|section| section.data.as_slice())
    };

    let mut encoded: HashMap<[u8; 4], Vec<u8>> = HashMap::new();
    if let Some((rebus, table)) = encode_rebus(grid, loaded(GRBS).zip(loaded(RTBL)), encoding)? {
        encoded.insert(GRBS, rebus);
        encoded.insert(RTBL, table);
    }
    if let Some(ltim) = encode_ltim(puzzle.timer, loaded(LTIM)) {
        encoded.insert(LTIM, ltim);
    }
    if let Some(gext) = encode_gext(grid, loaded(GEXT)) {
        encoded.insert(GEXT, gext);
    }
    if let Some(rusr) = encode_rusr(grid, loaded(RUSR), encoding)? {
        encoded.insert(RUSR, rusr);
    }
    if let Some(chkd) = encode_chkd(grid, loaded(CHKD)) {
        encoded.insert(CHKD, chkd);
    }

    // Known sections keep the order they were read in.
    let mut order: Vec<[u8; 4]> = decoded
        .iter()
        .map(|section| section.name)
        .filter(|name| KNOWN.contains(name))
        .collect();
    for name in KNOWN {
        if !order.contains(&name) {
            order.push(name);
        }
    }

    let mut written = Vec::new();
    for name in order {
        if let Some(data) = encoded.remove(&name) {
            push_section(out, name, &data)?;
            written.push(name);
        }
    }

    for section in &puzzle.format.sections {
        if written.contains(&section.name) {
            debug!("dropping stale {} section", section.name_str());
            continue;
        }
        push_section(out, section.name, &section.data)?;
    }
    Ok(())
}
