//! Query Surface
//!
//! Read-only operations used by the web layer: the ranked public listing,
//! existence checks, single-record fetches and fuzzy name search. The one
//! write, `request_refresh`, touches a single flag on a single record.
//!
//! Every query takes the store's read lock only for the duration of an
//! in-memory scan, never across I/O.

use tracing::debug;
use types::ids::ItemId;
use types::item::ItemRecord;
use types::numeric::Price;

use crate::store::ItemStore;

impl ItemStore {
    /// Ids of every tradeable item, most expensive first.
    ///
    /// Items priced at or below `floor` are left out. Equal prices are
    /// ordered by ascending id.
    pub fn ranked_listing(&self, floor: Price) -> Vec<ItemId> {
        let items = self.read();
        let mut ranked: Vec<(Price, ItemId)> = items
            .values()
            .filter(|r| is_tradeable(r, floor))
            .map(|r| (r.price, r.id))
            .collect();
        drop(items);

        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    /// Copy of the record for `id`; `None` means not found.
    pub fn fetch(&self, id: ItemId) -> Option<ItemRecord> {
        self.get(id)
    }

    /// Id of the item whose name is closest to `text` by edit distance,
    /// ignoring case. The lowest id wins ties. `None` on an empty store.
    pub fn fuzzy_find(&self, text: &str) -> Option<ItemId> {
        let needle: Vec<char> = text.to_lowercase().chars().collect();
        let mut best: Option<(usize, ItemId)> = None;

        // BTreeMap iteration is ascending by id, so a strict `<` keeps
        // the lowest id among equal distances.
        for (id, record) in self.read().iter() {
            let name: Vec<char> = record.name.to_lowercase().chars().collect();
            let distance = levenshtein(&needle, &name);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, *id));
                if distance == 0 {
                    break;
                }
            }
        }

        if let Some((distance, id)) = best {
            debug!(query = text, item = %id, distance, "Fuzzy match");
        }
        best.map(|(_, id)| id)
    }

    /// Ask the next refresh cycle to include `id` regardless of its
    /// population. Idempotent. Returns `false` if the id is unknown.
    pub fn request_refresh(&self, id: ItemId) -> bool {
        self.set_force_refresh(id)
    }
}

/// Whether a record may be bought: priced strictly above `floor`.
pub fn is_tradeable(record: &ItemRecord, floor: Price) -> bool {
    record.price.is_above(floor)
}

/// Classic edit distance with a single cost column sized to `a`.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut column: Vec<usize> = (0..=a.len()).collect();

    for (x, b_ch) in b.iter().enumerate() {
        column[0] = x + 1;
        let mut diagonal = x;
        for (y, a_ch) in a.iter().enumerate() {
            let above = column[y + 1];
            let substitution = diagonal + usize::from(a_ch != b_ch);
            column[y + 1] = (above + 1).min(column[y] + 1).min(substitution);
            diagonal = above;
        }
    }

    column[a.len()]
}
