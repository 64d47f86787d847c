use hashbrown::HashMap;
use libm::fabs;

// heuristic frequency for symbols never seen in english text
const UNKNOWN_EN: f64 = 0.00002;

/// Unigram frequencies of English characters (case-insensitive)
///
/// Letter frequencies from: https://en.wikipedia.org/wiki/Letter_frequency
///
/// Space is ranked above every letter, it separates roughly one in five characters
pub fn english_frequency(symbol: char) -> f64 {
    match symbol.to_ascii_lowercase() {
        ' ' => 0.18288,
        'a' => 0.08167,
        'b' => 0.01492,
        'c' => 0.02782,
        'd' => 0.04253,
        'e' => 0.12702,
        'f' => 0.02228,
        'g' => 0.02015,
        'h' => 0.06094,
        'i' => 0.06966,
        'j' => 0.00153,
        'k' => 0.00772,
        'l' => 0.04025,
        'm' => 0.02406,
        'n' => 0.06749,
        'o' => 0.07507,
        'p' => 0.01929,
        'q' => 0.00095,
        'r' => 0.05987,
        's' => 0.06327,
        't' => 0.09056,
        'u' => 0.02758,
        'v' => 0.00978,
        'w' => 0.02360,
        'x' => 0.00150,
        'y' => 0.01974,
        'z' => 0.00074,
        _ => UNKNOWN_EN,
    }
}

/// Proposed placeholder-to-symbol assignment
#[derive(Clone, Debug, PartialEq)]
pub struct Proposal {
    /// `permutation[id]` is the symbol proposed for placeholder `id`
    pub permutation: Vec<char>,
    /// Distance between observed and expected distributions, lower is better
    pub score: f64,
}

/// Frequency-analysis collaborator
///
/// Given placeholder ids with natural-language statistics, propose which alphabet
/// symbol each id stands for
///
/// Returns `None` when there are more placeholders than alphabet symbols, no
/// bijection exists then
pub trait FrequencySolver {
    fn propose(&self, ids: &[usize], alphabet: &[char]) -> Option<Proposal>;
}

/// Count occurrences of each placeholder id
pub fn observe_ids(ids: &[usize]) -> HashMap<usize, usize> {
    let mut res: HashMap<usize, usize> = HashMap::with_capacity(ids.len());

    for id in ids.iter() {
        *res.entry(*id).or_insert(0) += 1;
    }

    res
}

/// Rank placeholders by count against symbols ranked by English unigram frequency
///
/// A coarse first guess, adjacent letters with close frequencies are often swapped
#[derive(Clone, Copy, Debug, Default)]
pub struct UnigramRank;

impl FrequencySolver for UnigramRank {
    fn propose(&self, ids: &[usize], alphabet: &[char]) -> Option<Proposal> {
        let counts = observe_ids(ids);
        let distinct = counts.keys().max().map(|m| m + 1).unwrap_or(0);

        if distinct > alphabet.len() {
            return None;
        }

        // most frequent placeholder first, first-seen id breaks ties
        let mut by_count: Vec<usize> = (0..distinct).collect();
        by_count.sort_by(|a, b| {
            let ca = counts.get(a).copied().unwrap_or(0);
            let cb = counts.get(b).copied().unwrap_or(0);
            cb.cmp(&ca).then(a.cmp(b))
        });

        let mut by_freq: Vec<char> = alphabet.to_vec();
        by_freq.sort_by(|a, b| english_frequency(*b).total_cmp(&english_frequency(*a)));

        let mut permutation = vec!['\0'; distinct];
        for (id, symbol) in by_count.iter().zip(by_freq.iter()) {
            permutation[*id] = *symbol;
        }

        let expected_total: f64 = alphabet.iter().map(|&c| english_frequency(c)).sum();
        let observed_total = ids.len().max(1) as f64;

        let mut delta = 0.0_f64;
        for (id, symbol) in permutation.iter().enumerate() {
            let observed = counts.get(&id).copied().unwrap_or(0) as f64 / observed_total;
            let expected = english_frequency(*symbol) / expected_total;
            delta += fabs(expected - observed);
        }

        Some(Proposal { permutation, score: delta })
    }
}
