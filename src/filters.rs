//! Post-processing filters applied to a batch before it is accepted.
//!
//! Both filters only look at items still marked [`ItemStatus::AllOk`] and
//! flag in place, so running them again is a no-op and indices stay valid.

use tracing::info;

use crate::{ItemStatus, QueryState, ResultList};

/// Known placeholder payloads that providers return instead of real data.
pub const DEFAULT_BLACKLIST: &[&[u8]] = &[b"http://ecx.images-amazon.com/images/I/11J2DMYABHL.jpg"];

/// Flags later copies of identical payloads as [`ItemStatus::Duplicate`].
///
/// Returns the number of newly flagged items; the accepted counter is
/// lowered by the same amount.
pub fn flag_duplicates(list: &mut ResultList, state: &mut QueryState) -> usize {
    let items = list.items_mut();
    let mut flagged = 0;

    for i in 0..items.len() {
        if !items[i].is_ok() {
            continue;
        }
        for j in (i + 1)..items.len() {
            if items[j].is_ok() && items[i].data == items[j].data {
                items[j].status = ItemStatus::Duplicate;
                flagged += 1;
            }
        }
    }

    if flagged > 0 {
        info!("Ignoring {} item(s) that occur twice", flagged);
        state.reject(flagged);
    }
    flagged
}

/// Flags items whose payload exactly matches an entry of `blacklist`.
///
/// Returns the number of newly flagged items; the accepted counter is
/// lowered by the same amount.
pub fn flag_blacklisted(list: &mut ResultList, blacklist: &[&[u8]], state: &mut QueryState) -> usize {
    let mut flagged = 0;

    for item in list.items_mut().iter_mut().filter(|item| item.is_ok()) {
        if blacklist.iter().any(|bad| item.data.as_slice() == *bad) {
            item.status = ItemStatus::Blacklisted;
            flagged += 1;
        }
    }

    if flagged > 0 {
        info!("Ignoring {} blacklisted item(s)", flagged);
        state.reject(flagged);
    }
    flagged
}
