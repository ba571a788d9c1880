//! Supplier selection for a lead.
//!
//! Randomness spreads load across equally eligible suppliers; callers must
//! treat the result as "one of the candidate set", never a fixed value.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::lead::DEFAULT_CATEGORY;
use crate::{Lead, Supplier};

/// Pick one active supplier covering the lead's state.
///
/// Suppliers that also serve the lead's category (or serve every category)
/// are preferred; if none do, any state match is acceptable.
pub fn select_supplier<'a, R>(lead: &Lead, suppliers: &'a [Supplier], rng: &mut R) -> Option<&'a Supplier>
where
    R: Rng + ?Sized,
{
    let state_matches: Vec<&Supplier> = suppliers
        .iter()
        .filter(|s| s.active && s.serves_state(&lead.state))
        .collect();
    if state_matches.is_empty() {
        return None;
    }

    let category = if lead.category.is_empty() {
        DEFAULT_CATEGORY
    } else {
        lead.category.as_str()
    };
    let category_matches: Vec<&Supplier> = state_matches
        .iter()
        .copied()
        .filter(|s| s.serves_category(category))
        .collect();

    let pool = if category_matches.is_empty() {
        &state_matches
    } else {
        &category_matches
    };
    pool.choose(rng).copied()
}
