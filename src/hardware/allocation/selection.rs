//! Path-Aware Device Selection
//!
//! Pure selection over a snapshot of a template's paths. Each path is the
//! list of its mapped devices ordered by address; the device half is `None`
//! for an address that is mapped to the template but unknown to the registry.

use crate::db::Tables;
use crate::domain::{AllocatedFcp, FcpDevice, FcpId, MIN_FCP_PATHS_UNSET};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Mapped devices of one path in address order
pub type PathSlots<'a> = Vec<(FcpId, Option<&'a FcpDevice>)>;

/// Snapshot the paths of a template, ordered by path index
pub(crate) fn path_slots<'a>(t: &'a Tables, tmpl_id: &str) -> Vec<PathSlots<'a>> {
    t.template_paths(tmpl_id)
        .into_values()
        .map(|devices| {
            devices
                .into_iter()
                .map(|id| {
                    let device = t.fcp.get(&id);
                    (id, device)
                })
                .collect()
        })
        .collect()
}

/// Number of paths that must yield a device
#[inline]
pub fn effective_min_paths(min_fcp_paths_count: i32, path_count: usize) -> usize {
    if min_fcp_paths_count == MIN_FCP_PATHS_UNSET {
        path_count
    } else {
        min_fcp_paths_count.max(0) as usize
    }
}

/// One random eligible device per path
///
/// Paths without an eligible device are skipped. Returns nothing when fewer
/// than the effective minimum number of paths could contribute.
pub fn select_fcp_devices<R: Rng + ?Sized>(
    rng: &mut R,
    paths: &[PathSlots<'_>],
    min_fcp_paths_count: i32,
) -> Vec<AllocatedFcp> {
    if paths.is_empty() {
        return Vec::new();
    }

    let picked: Vec<AllocatedFcp> = paths
        .iter()
        .filter_map(|slots| {
            let eligible: Vec<&FcpDevice> = slots
                .iter()
                .filter_map(|(_, dev)| *dev)
                .filter(|dev| dev.is_eligible())
                .collect();
            eligible.choose(&mut *rng).map(|dev| dev.allocated())
        })
        .collect();

    if picked.len() < effective_min_paths(min_fcp_paths_count, paths.len()) {
        return Vec::new();
    }
    picked
}

/// Eligible devices of one path keyed by their trailing index digits
fn eligible_by_index<'a>(slots: &PathSlots<'a>) -> BTreeMap<u8, Vec<&'a FcpDevice>> {
    let mut by_index: BTreeMap<u8, Vec<&'a FcpDevice>> = BTreeMap::new();
    for (fcp_id, device) in slots.iter() {
        match *device {
            Some(dev) if dev.is_eligible() => by_index.entry(fcp_id.index()).or_default().push(dev),
            _ => {}
        }
    }
    by_index
}

fn shared_indices(per_path: &[BTreeMap<u8, Vec<&FcpDevice>>]) -> Vec<u8> {
    let Some((first, rest)) = per_path.split_first() else {
        return Vec::new();
    };
    first
        .keys()
        .copied()
        .filter(|idx| rest.iter().all(|path| path.contains_key(idx)))
        .collect()
}

/// Index digits at which every path has an eligible device
pub fn common_free_indices(paths: &[PathSlots<'_>]) -> Vec<u8> {
    let per_path: Vec<_> = paths.iter().map(eligible_by_index).collect();
    shared_indices(&per_path)
}

/// One device per path, all sharing the same trailing index digits
///
/// Returns nothing when no index is free on every path at once.
pub fn select_fcp_devices_with_same_index<R: Rng + ?Sized>(
    rng: &mut R,
    paths: &[PathSlots<'_>],
) -> Vec<AllocatedFcp> {
    let per_path: Vec<_> = paths.iter().map(eligible_by_index).collect();
    let indices = shared_indices(&per_path);
    let Some(&idx) = indices.choose(&mut *rng) else {
        return Vec::new();
    };
    per_path
        .iter()
        .filter_map(|by_index| {
            by_index
                .get(&idx)
                .and_then(|devices| devices.choose(&mut *rng))
                .map(|dev| dev.allocated())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FcpState;
    use crate::hardware::testing::{fcp, fcp_info};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn device(id: &str) -> FcpDevice {
        FcpDevice::from_info(&fcp_info(id, FcpState::Free))
    }

    fn busy(id: &str) -> FcpDevice {
        let mut dev = device(id);
        dev.connections = 1;
        dev
    }

    fn slots(devices: &[FcpDevice]) -> PathSlots<'_> {
        devices
            .iter()
            .map(|dev| (dev.fcp_id.clone(), Some(dev)))
            .collect()
    }

    fn ids(picked: &[AllocatedFcp]) -> Vec<String> {
        picked.iter().map(|a| a.fcp_id.to_string()).collect()
    }

    fn pairs(combos: &[[&str; 2]]) -> BTreeSet<Vec<String>> {
        combos
            .iter()
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_random_covers_every_combination() {
        let p0 = [device("1a00"), device("1a01"), busy("1a02")];
        let p1 = [device("1b00"), device("1b01")];
        let paths = vec![slots(&p0), slots(&p1)];

        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = BTreeSet::new();
        for _ in 0..300 {
            let picked = select_fcp_devices(&mut rng, &paths, MIN_FCP_PATHS_UNSET);
            assert_eq!(picked.len(), 2);
            seen.insert(ids(&picked));
        }

        assert_eq!(
            seen,
            pairs(&[
                ["1a00", "1b00"],
                ["1a00", "1b01"],
                ["1a01", "1b00"],
                ["1a01", "1b01"],
            ])
        );
    }

    #[test]
    fn test_random_respects_min_paths() {
        let p0 = [device("1a00")];
        let p1 = [busy("1b00")];
        let p2 = [device("1c00")];
        let paths = vec![slots(&p0), slots(&p1), slots(&p2)];
        let mut rng = StdRng::seed_from_u64(1);

        // every path required
        assert!(select_fcp_devices(&mut rng, &paths, MIN_FCP_PATHS_UNSET).is_empty());
        assert!(select_fcp_devices(&mut rng, &paths, 3).is_empty());

        let picked = select_fcp_devices(&mut rng, &paths, 2);
        assert_eq!(ids(&picked), vec!["1a00", "1c00"]);
        let picked = select_fcp_devices(&mut rng, &paths, 1);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_random_skips_unknown_and_unusable_devices() {
        let mut offline = device("1a01");
        offline.state = FcpState::Offline;
        let mut no_wwpn = device("1a02");
        no_wwpn.wwpn_npiv.clear();
        let p0 = [offline, no_wwpn, device("1a03")];
        let mut path = vec![(fcp("1a00"), None)];
        path.extend(slots(&p0));
        let paths = vec![path];

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let picked = select_fcp_devices(&mut rng, &paths, MIN_FCP_PATHS_UNSET);
            assert_eq!(ids(&picked), vec!["1a03"]);
        }
    }

    #[test]
    fn test_no_paths_means_no_devices() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_fcp_devices(&mut rng, &[], 1).is_empty());
        assert!(select_fcp_devices_with_same_index(&mut rng, &[]).is_empty());
        assert!(common_free_indices(&[]).is_empty());
    }

    #[test]
    fn test_same_index_never_mixes_indices() {
        let p0 = [device("1a00"), busy("1a01"), device("1a02"), device("1a03")];
        let p1 = [device("1b00"), device("1b01"), busy("1b02"), device("1b03")];
        let paths = vec![slots(&p0), slots(&p1)];
        assert_eq!(common_free_indices(&paths), vec![0x00, 0x03]);

        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = BTreeSet::new();
        for _ in 0..300 {
            let picked = select_fcp_devices_with_same_index(&mut rng, &paths);
            assert_eq!(picked.len(), 2);
            assert_eq!(picked[0].fcp_id.index(), picked[1].fcp_id.index());
            seen.insert(ids(&picked));
        }
        assert_eq!(seen, pairs(&[["1a00", "1b00"], ["1a03", "1b03"]]));
    }

    #[test]
    fn test_same_index_with_offset_ranges() {
        // 1A00-1A03;1B01-1B04: positions differ from index digits
        let p0 = [device("1a00"), device("1a01"), device("1a02"), device("1a03")];
        let p1 = [device("1b01"), device("1b02"), device("1b03"), device("1b04")];
        let paths = vec![slots(&p0), slots(&p1)];
        assert_eq!(common_free_indices(&paths), vec![0x01, 0x02, 0x03]);

        let mut rng = StdRng::seed_from_u64(21);
        let mut seen = BTreeSet::new();
        for _ in 0..300 {
            let picked = select_fcp_devices_with_same_index(&mut rng, &paths);
            assert_eq!(picked.len(), 2);
            assert_eq!(picked[0].fcp_id.index(), picked[1].fcp_id.index());
            seen.insert(ids(&picked));
        }
        assert_eq!(
            seen,
            pairs(&[["1a01", "1b01"], ["1a02", "1b02"], ["1a03", "1b03"]])
        );
    }

    #[test]
    fn test_same_index_with_gapped_ranges() {
        // 1A00,1A02;1B00-1B03
        let p0 = [device("1a00"), device("1a02")];
        let p1 = [device("1b00"), device("1b01"), device("1b02"), device("1b03")];
        let paths = vec![slots(&p0), slots(&p1)];
        assert_eq!(common_free_indices(&paths), vec![0x00, 0x02]);

        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = BTreeSet::new();
        for _ in 0..300 {
            let picked = select_fcp_devices_with_same_index(&mut rng, &paths);
            assert_eq!(picked[0].fcp_id.index(), picked[1].fcp_id.index());
            seen.insert(ids(&picked));
        }
        assert_eq!(seen, pairs(&[["1a00", "1b00"], ["1a02", "1b02"]]));
    }

    #[test]
    fn test_same_index_exhausted() {
        let p0 = [busy("1a00"), device("1a01")];
        let p1 = [device("1b00"), busy("1b01")];
        let paths = vec![slots(&p0), slots(&p1)];
        let mut rng = StdRng::seed_from_u64(9);
        assert!(select_fcp_devices_with_same_index(&mut rng, &paths).is_empty());
        // the random strategy still finds a pair
        assert_eq!(
            ids(&select_fcp_devices(&mut rng, &paths, MIN_FCP_PATHS_UNSET)),
            vec!["1a01", "1b00"]
        );
    }

    #[test]
    fn test_same_index_requires_index_on_every_path() {
        let p0 = [device("1a00"), device("1a01")];
        let p1 = [busy("1b00")];
        let paths = vec![slots(&p0), slots(&p1)];
        assert!(common_free_indices(&paths).is_empty());

        // unknown device at an index disqualifies it
        let p1 = [device("1b00")];
        let mut path = slots(&p1);
        path.push((fcp("1b01"), None));
        let paths = vec![slots(&p0), path];
        assert_eq!(common_free_indices(&paths), vec![0x00]);
    }

    #[test]
    fn test_same_index_picks_an_eligible_device_sharing_the_index() {
        // two devices of one path share index 05
        let p0 = [device("1a05"), busy("1c05")];
        let p1 = [device("1b05")];
        let paths = vec![slots(&p0), slots(&p1)];

        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..50 {
            let picked = select_fcp_devices_with_same_index(&mut rng, &paths);
            assert_eq!(ids(&picked), vec!["1a05", "1b05"]);
        }
    }
}
