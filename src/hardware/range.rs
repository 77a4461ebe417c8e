//! FCP Device List Shorthand
//!
//! Templates take their devices as a compact string: `;` separates paths,
//! `,` separates items within a path and `-` marks an inclusive range, e.g.
//! `1A00-1A03;1B00-1B03` or `0011-0013,0015;0021-0023,0025`.

use crate::domain::{FcpId, FcpPaths};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Expand a shorthand list into devices per path
///
/// Whitespace is ignored, as are empty `;` segments; path indices are
/// assigned to the non-empty segments in order.
pub fn expand_fcp_list(input: &str) -> Result<FcpPaths> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = |reason: String| Error::InvalidFcpList {
        input: input.to_string(),
        reason,
    };

    let mut paths = FcpPaths::new();
    let mut seen: BTreeMap<FcpId, usize> = BTreeMap::new();

    for segment in compact.split(';').filter(|s| !s.is_empty()) {
        let path = paths.len();
        let devices = paths.entry(path).or_default();

        for item in segment.split(',') {
            if item.is_empty() {
                return Err(invalid(format!("empty item in path {}", path)));
            }
            let (start, end) = match item.split_once('-') {
                Some((start, end)) => (parse_addr(start, &invalid)?, parse_addr(end, &invalid)?),
                None => {
                    let addr = parse_addr(item, &invalid)?;
                    (addr, addr)
                }
            };
            if start > end {
                return Err(invalid(format!(
                    "range {} starts after it ends",
                    item.to_uppercase()
                )));
            }
            for n in start..=end {
                let fcp_id = FcpId::from_number(n);
                if let Some(other) = seen.get(&fcp_id) {
                    if *other != path {
                        return Err(invalid(format!(
                            "FCP device {} appears in path {} and path {}",
                            fcp_id.to_upper(),
                            other,
                            path
                        )));
                    }
                }
                seen.insert(fcp_id.clone(), path);
                devices.insert(fcp_id);
            }
        }
    }

    Ok(paths)
}

fn parse_addr(s: &str, invalid: &impl Fn(String) -> Error) -> Result<u16> {
    s.parse::<FcpId>()
        .map(|id| id.number())
        .map_err(|_| invalid(format!("{:?} is not a 1-4 digit hex address", s)))
}

/// Compress devices of one path, e.g. `1A00-1A03,1A05`
pub fn shrink_fcp_list<'a>(fcp_ids: impl IntoIterator<Item = &'a FcpId>) -> String {
    let mut numbers: Vec<u16> = fcp_ids.into_iter().map(FcpId::number).collect();
    numbers.sort_unstable();
    numbers.dedup();

    let mut runs: Vec<(u16, u16)> = Vec::new();
    for n in numbers {
        match runs.last_mut() {
            Some((_, end)) if n.checked_sub(1) == Some(*end) => *end = n,
            _ => runs.push((n, n)),
        }
    }

    runs.iter()
        .map(|(start, end)| {
            if start == end {
                format!("{:04X}", start)
            } else {
                format!("{:04X}-{:04X}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Compress devices of all paths, e.g. `1A00-1A03;1B00-1B03`
pub fn shrink_fcp_paths(paths: &FcpPaths) -> String {
    paths
        .values()
        .map(|devices| shrink_fcp_list(devices))
        .collect::<Vec<_>>()
        .join(";")
}
