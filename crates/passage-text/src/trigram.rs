//! Trigram similarity in the style of PostgreSQL's `pg_trgm`.
//!
//! Text is split into lowercase alphanumeric words, each word is padded with two
//! leading spaces and one trailing space, and every three-character window of the
//! padded word is a trigram. Similarity is the Jaccard coefficient of two trigram
//! sets.

use std::collections::{HashMap, HashSet};

pub type Trigram = [char; 3];

pub fn words(text: &str) -> Vec<String> {
	text.split(|c: char| !c.is_alphanumeric())
		.filter(|w| !w.is_empty())
		.map(|w| w.to_lowercase())
		.collect()
}

/// Distinct trigrams of one word.
pub fn word_trigrams(word: &str) -> Vec<Trigram> {
	let padded: Vec<char> = "  ".chars().chain(word.chars()).chain(std::iter::once(' ')).collect();
	let mut out: Vec<Trigram> = Vec::new();
	for w in padded.windows(3) {
		let t = [w[0], w[1], w[2]];
		if !out.contains(&t) {
			out.push(t);
		}
	}
	out
}

pub fn trigram_set(text: &str) -> HashSet<Trigram> {
	words(text).iter().flat_map(|w| word_trigrams(w)).collect()
}

pub fn similarity(a: &str, b: &str) -> f32 {
	jaccard(&trigram_set(a), &trigram_set(b))
}

pub fn jaccard(a: &HashSet<Trigram>, b: &HashSet<Trigram>) -> f32 {
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}
	let shared = a.intersection(b).count();
	shared as f32 / (a.len() + b.len() - shared) as f32
}

/// Pre-split text: trigrams per word, in word order.
#[derive(Debug, Clone, Default)]
pub struct TrigramText {
	words: Vec<Vec<Trigram>>,
}

impl TrigramText {
	pub fn new(text: &str) -> Self {
		Self { words: words(text).iter().map(|w| word_trigrams(w)).collect() }
	}

	pub fn is_empty(&self) -> bool {
		self.words.is_empty()
	}

	/// Greatest similarity between `query` and any run of consecutive words as
	/// long as the query (the whole text when it is shorter).
	pub fn best_window_similarity(&self, query: &TrigramQuery) -> f32 {
		if self.words.is_empty() || query.set.is_empty() {
			return 0.0;
		}
		let width = query.word_count.clamp(1, self.words.len());
		let mut counts: HashMap<Trigram, usize> = HashMap::new();
		let mut shared = 0usize;
		let mut best = 0.0f32;
		for (i, word) in self.words.iter().enumerate() {
			for t in word {
				let n = counts.entry(*t).or_insert(0);
				if *n == 0 && query.set.contains(t) {
					shared += 1;
				}
				*n += 1;
			}
			if i >= width {
				for t in &self.words[i - width] {
					if let Some(n) = counts.get_mut(t) {
						*n -= 1;
						if *n == 0 {
							counts.remove(t);
							if query.set.contains(t) {
								shared -= 1;
							}
						}
					}
				}
			}
			if i + 1 >= width {
				let union = query.set.len() + counts.len() - shared;
				best = best.max(shared as f32 / union as f32);
			}
		}
		best
	}
}

#[derive(Debug, Clone)]
pub struct TrigramQuery {
	set: HashSet<Trigram>,
	word_count: usize,
}

impl TrigramQuery {
	pub fn new(query: &str) -> Self {
		let w = words(query);
		Self { set: w.iter().flat_map(|w| word_trigrams(w)).collect(), word_count: w.len() }
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}
}
