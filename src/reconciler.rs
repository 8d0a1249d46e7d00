//! Reconciliation of raw provider output into the canonical display list
//!
//! The pipeline is pure and synchronous: noise filtering, deduplication,
//! favorite re-application, segment and search filtering, then ordering.
//! It runs on every successful fetch and on every view-state change.

use crate::{
    constants::{NAME_BLACKLIST, PINNED_SYMBOLS},
    types::{CoinRecord, Segment, SortDirection, SortField, ViewState},
};
use std::collections::{BTreeSet, HashSet};

/// Builds the canonical ordered coin list from raw fetch output.
///
/// `favorites` is the persisted favorite set; remote data never carries the
/// favorite flag, so it is re-applied here after every wholesale replacement.
pub fn reconcile(
    raw: Vec<CoinRecord>,
    favorites: &BTreeSet<String>,
    view: &ViewState,
) -> Vec<CoinRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let search = view.search.to_lowercase();

    let mut coins: Vec<CoinRecord> = raw
        .into_iter()
        .filter(|coin| !is_noise(&coin.name))
        // paged results can repeat a symbol; first occurrence wins
        .filter(|coin| seen.insert(coin.symbol.clone()))
        .map(|mut coin| {
            coin.favorite = favorites.contains(&coin.symbol);
            coin
        })
        .filter(|coin| matches_segment(coin, view.segment))
        .filter(|coin| matches_search(coin, &search))
        .collect();

    if view.is_default() {
        order_pinned(&mut coins);
    } else {
        sort_by(&mut coins, view.sort_field, view.sort_direction);
    }

    coins
}

/// True when the display name marks a wrapped/bridged/synthetic listing
fn is_noise(name: &str) -> bool {
    let lower = name.to_lowercase();
    NAME_BLACKLIST.iter().any(|bad| lower.contains(bad))
}

fn matches_segment(coin: &CoinRecord, segment: Segment) -> bool {
    match segment {
        Segment::All => true,
        Segment::Favorites => coin.favorite,
        Segment::Gainers => coin.change_24h > 0.0,
        Segment::Losers => coin.change_24h < 0.0,
    }
}

/// Case-insensitive substring match against symbol or name; an empty
/// search matches everything.
fn matches_search(coin: &CoinRecord, search: &str) -> bool {
    search.is_empty()
        || coin.symbol.to_lowercase().contains(search)
        || coin.name.to_lowercase().contains(search)
}

/// Default-view ordering: allow-listed majors first, in allow-list order,
/// then everything else by market cap descending.
fn order_pinned(coins: &mut Vec<CoinRecord>) {
    let mut pinned: Vec<CoinRecord> = Vec::new();
    let mut rest: Vec<CoinRecord> = Vec::new();

    for coin in coins.drain(..) {
        if PINNED_SYMBOLS.contains(&coin.symbol.as_str()) {
            pinned.push(coin);
        } else {
            rest.push(coin);
        }
    }

    pinned.sort_by_key(|coin| {
        PINNED_SYMBOLS
            .iter()
            .position(|sym| *sym == coin.symbol)
            .unwrap_or(usize::MAX)
    });
    rest.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));

    pinned.extend(rest);
    *coins = pinned;
}

fn sort_by(coins: &mut [CoinRecord], field: SortField, direction: SortDirection) {
    coins.sort_by(|a, b| {
        let ordering = match field {
            SortField::Symbol => a.symbol.cmp(&b.symbol),
            SortField::Price => a.price.total_cmp(&b.price),
            SortField::Change24h => a.change_24h.total_cmp(&b.change_24h),
            SortField::Volume => a.volume.total_cmp(&b.volume),
            SortField::MarketCap => a.market_cap.total_cmp(&b.market_cap),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(symbol: &str, name: &str, market_cap: f64) -> CoinRecord {
        let mut c = CoinRecord::new(symbol, name, 100.0, 1.0, 0.1, 1000.0, market_cap);
        c.price = market_cap / 1000.0;
        c
    }

    fn no_favorites() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut early_btc = coin("BTC", "Bitcoin", 1e12);
        early_btc.price = 50_000.0;
        let mut late_btc = coin("BTC", "Bitcoin", 9e11);
        late_btc.price = 49_000.0;

        let mut raw = vec![coin("AAA", "Aaa", 1.0); 5];
        raw.push(early_btc.clone());
        raw.extend(vec![coin("BBB", "Bbb", 2.0); 4]);
        raw.push(coin("ETH", "Ethereum", 4e11));
        raw.extend(vec![coin("CCC", "Ccc", 3.0); 3]);
        raw.push(late_btc);

        // AAA/BBB/CCC duplicates collapse too, so dedup them out of the way
        let view = ViewState {
            search: "btc".to_string(),
            ..ViewState::default()
        };
        let result = reconcile(raw, &no_favorites(), &view);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "BTC");
        assert_eq!(result[0].price, 50_000.0);
    }

    #[test]
    fn pinned_symbols_lead_in_default_view() {
        let raw = vec![
            coin("RANDOM", "Randomcoin", 5e12),
            coin("ETH", "Ethereum", 4e11),
            coin("BTC", "Bitcoin", 1e12),
        ];

        let result = reconcile(raw, &no_favorites(), &ViewState::default());
        let symbols: Vec<&str> = result.iter().map(|c| c.symbol.as_str()).collect();

        // RANDOM has the largest cap but the allow-list wins in default state
        assert_eq!(symbols, vec!["BTC", "ETH", "RANDOM"]);
    }

    #[test]
    fn non_default_view_sorts_purely_by_active_field() {
        let raw = vec![
            coin("ETH", "Ethereum", 4e11),
            coin("BTC", "Bitcoin", 1e12),
            coin("SOL", "Solana", 7e10),
        ];

        let view = ViewState {
            sort_field: SortField::Symbol,
            sort_direction: SortDirection::Ascending,
            ..ViewState::default()
        };
        let result = reconcile(raw, &no_favorites(), &view);
        let symbols: Vec<&str> = result.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn noise_names_are_dropped() {
        let raw = vec![
            coin("WBTC", "Wrapped Bitcoin", 1e10),
            coin("BTC", "Bitcoin", 1e12),
            coin("STETH", "Lido Staked Ether", 2e10),
        ];

        let result = reconcile(raw, &no_favorites(), &ViewState::default());
        let symbols: Vec<&str> = result.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC"]);
    }

    #[test]
    fn favorites_are_reapplied_from_store() {
        let mut favorites = BTreeSet::new();
        favorites.insert("ETH".to_string());

        let raw = vec![coin("BTC", "Bitcoin", 1e12), coin("ETH", "Ethereum", 4e11)];
        let result = reconcile(raw, &favorites, &ViewState::default());

        let eth = result.iter().find(|c| c.symbol == "ETH").unwrap();
        let btc = result.iter().find(|c| c.symbol == "BTC").unwrap();
        assert!(eth.favorite);
        assert!(!btc.favorite);
    }

    #[test]
    fn favorites_segment_filters_to_favorites_only() {
        let mut favorites = BTreeSet::new();
        favorites.insert("SOL".to_string());

        let raw = vec![coin("BTC", "Bitcoin", 1e12), coin("SOL", "Solana", 7e10)];
        let view = ViewState {
            segment: Segment::Favorites,
            ..ViewState::default()
        };
        let result = reconcile(raw, &favorites, &view);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "SOL");
    }

    #[test]
    fn gainers_and_losers_split_on_24h_change() {
        let mut up = coin("UP", "Upcoin", 1e9);
        up.change_24h = 4.2;
        let mut down = coin("DOWN", "Downcoin", 1e9);
        down.change_24h = -2.1;
        let mut flat = coin("FLAT", "Flatcoin", 1e9);
        flat.change_24h = 0.0;

        let raw = vec![up, down, flat];

        let gainers = reconcile(
            raw.clone(),
            &no_favorites(),
            &ViewState {
                segment: Segment::Gainers,
                ..ViewState::default()
            },
        );
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].symbol, "UP");

        let losers = reconcile(
            raw,
            &no_favorites(),
            &ViewState {
                segment: Segment::Losers,
                ..ViewState::default()
            },
        );
        assert_eq!(losers.len(), 1);
        assert_eq!(losers[0].symbol, "DOWN");
    }

    #[test]
    fn search_and_segment_are_conjunctive() {
        let mut bit_up = coin("BTC", "Bitcoin", 1e12);
        bit_up.change_24h = 1.0;
        let mut bit_down = coin("BCH", "Bitcoin Cash", 1e10);
        bit_down.change_24h = -1.0;

        let view = ViewState {
            segment: Segment::Gainers,
            search: "bitcoin".to_string(),
            ..ViewState::default()
        };
        let result = reconcile(vec![bit_up, bit_down], &no_favorites(), &view);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "BTC");
    }

    #[test]
    fn search_matches_symbol_or_name() {
        let raw = vec![coin("BTC", "Bitcoin", 1e12), coin("ETH", "Ethereum", 4e11)];

        let by_symbol = reconcile(
            raw.clone(),
            &no_favorites(),
            &ViewState {
                search: "eth".to_string(),
                ..ViewState::default()
            },
        );
        let symbols: Vec<&str> = by_symbol.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ETH"]);

        let by_name = reconcile(
            raw,
            &no_favorites(),
            &ViewState {
                search: "bitco".to_string(),
                ..ViewState::default()
            },
        );
        let symbols: Vec<&str> = by_name.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC"]);
    }

    #[test]
    fn descending_sort_reverses_ordering() {
        let raw = vec![
            coin("A", "A", 1.0),
            coin("B", "B", 3.0),
            coin("C", "C", 2.0),
        ];
        let view = ViewState {
            sort_field: SortField::MarketCap,
            sort_direction: SortDirection::Ascending,
            segment: Segment::All,
            search: String::new(),
        };

        // MarketCap ascending is a non-default state (default is descending)
        let result = reconcile(raw, &no_favorites(), &view);
        let symbols: Vec<&str> = result.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "C", "B"]);
    }
}
