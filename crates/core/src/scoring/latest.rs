use crate::domain::signal::SignalObservation;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Reduces a stream of observations to the most recent one per source.
///
/// Output is ordered by source name. Two rows for the same source and date cannot come
/// out of the store; if they do, the one scanned last wins.
pub fn resolve_latest<I>(observations: I) -> Vec<SignalObservation>
where
    I: IntoIterator<Item = SignalObservation>,
{
    let mut by_source: BTreeMap<String, SignalObservation> = BTreeMap::new();

    for obs in observations {
        match by_source.entry(obs.source.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(obs);
            }
            Entry::Occupied(mut slot) => {
                if obs.date >= slot.get().date {
                    slot.insert(obs);
                }
            }
        }
    }

    by_source.into_values().collect()
}
