//! Linear-chain CRF for tagging author block tokens.
//!
//! Emission scores are sums of feature weights keyed by `(label, feature)`.
//! The transition score is fixed: 0.1 when consecutive labels agree, 0
//! otherwise. Training maximizes the conditional log likelihood by plain
//! SGD, with expectations from log-space forward-backward.

use fxhash::FxHashMap;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    O,
    Author,
    Affiliation,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::O, Label::Author, Label::Affiliation];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::O => "O",
            Label::Author => "AUTHOR",
            Label::Affiliation => "AFFILIATION",
        }
    }
}

const SAME_LABEL_SCORE: f64 = 0.1;

fn transition(prev: Label, cur: Label) -> f64 {
    if prev == cur {
        SAME_LABEL_SCORE
    } else {
        0.0
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Feature strings for every position of a token sequence.
pub fn extract_features<S: AsRef<str>>(words: &[S]) -> Vec<Vec<String>> {
    (0..words.len())
        .map(|i| {
            let word = words[i].as_ref();
            let capitalized = word.chars().next().map_or(false, char::is_uppercase);
            vec![
                format!("WORD={}", word),
                if capitalized { "CAP".to_string() } else { "NOT_CAP".to_string() },
                match i.checked_sub(1) {
                    Some(p) => format!("PREV_WORD={}", words[p].as_ref()),
                    None => "BOS".to_string(),
                },
                match words.get(i + 1) {
                    Some(n) => format!("NEXT_WORD={}", n.as_ref()),
                    None => "EOS".to_string(),
                },
            ]
        })
        .collect()
}

/// A labelled training sequence.
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub words: Vec<String>,
    pub labels: Vec<Label>,
}

impl TrainingExample {
    pub fn new(words: &[&str], labels: &[Label]) -> Self {
        TrainingExample {
            words: words.iter().map(|w| w.to_string()).collect(),
            labels: labels.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrfModel {
    weights: FxHashMap<(Label, String), f64>,
}

impl CrfModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, label: Label, feature: &str) -> f64 {
        self.weights.get(&(label, feature.to_string())).copied().unwrap_or(0.0)
    }

    fn emission(&self, label: Label, features: &[String]) -> f64 {
        features
            .iter()
            .filter_map(|f| self.weights.get(&(label, f.clone())))
            .sum()
    }

    /// Log-space forward and backward tables plus the log partition.
    fn forward_backward(&self, features: &[Vec<String>]) -> (Vec<[f64; 3]>, Vec<[f64; 3]>, f64) {
        let n = features.len();
        let emissions: Vec<[f64; 3]> = features
            .iter()
            .map(|f| Label::ALL.map(|l| self.emission(l, f)))
            .collect();

        let mut alpha = vec![[0.0; 3]; n];
        alpha[0] = emissions[0];
        for t in 1..n {
            for (j, cur) in Label::ALL.iter().enumerate() {
                let scores: Vec<f64> = Label::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, prev)| alpha[t - 1][i] + transition(*prev, *cur))
                    .collect();
                alpha[t][j] = log_sum_exp(&scores) + emissions[t][j];
            }
        }

        let mut beta = vec![[0.0; 3]; n];
        for t in (0..n - 1).rev() {
            for (i, cur) in Label::ALL.iter().enumerate() {
                let scores: Vec<f64> = Label::ALL
                    .iter()
                    .enumerate()
                    .map(|(j, next)| transition(*cur, *next) + emissions[t + 1][j] + beta[t + 1][j])
                    .collect();
                beta[t][i] = log_sum_exp(&scores);
            }
        }

        let log_z = log_sum_exp(&alpha[n - 1]);
        (alpha, beta, log_z)
    }

    /// Per-position label probabilities.
    pub fn marginals<S: AsRef<str>>(&self, words: &[S]) -> Vec<[f64; 3]> {
        if words.is_empty() {
            return Vec::new();
        }
        let features = extract_features(words);
        let (alpha, beta, log_z) = self.forward_backward(&features);
        alpha
            .iter()
            .zip(&beta)
            .map(|(a, b)| [0, 1, 2].map(|j| (a[j] + b[j] - log_z).exp()))
            .collect()
    }

    /// Negative log likelihood of one sequence, with gradient applied.
    fn sgd_step(&mut self, example: &TrainingExample, learning_rate: f64) -> f64 {
        let features = extract_features(&example.words);
        let (alpha, beta, log_z) = self.forward_backward(&features);

        let mut gold_score = 0.0;
        let mut gradient: FxHashMap<(Label, String), f64> = FxHashMap::default();
        for (t, feats) in features.iter().enumerate() {
            let gold = example.labels[t];
            gold_score += self.emission(gold, feats);
            if t > 0 {
                gold_score += transition(example.labels[t - 1], gold);
            }
            for (j, label) in Label::ALL.iter().enumerate() {
                let expected = (alpha[t][j] + beta[t][j] - log_z).exp();
                let observed = if *label == gold { 1.0 } else { 0.0 };
                for f in feats {
                    *gradient.entry((*label, f.clone())).or_default() += observed - expected;
                }
            }
        }
        for (key, g) in gradient {
            *self.weights.entry(key).or_default() += learning_rate * g;
        }
        log_z - gold_score
    }

    /// Train for `epochs` passes over `data`. Sequences whose label count
    /// does not match their length are skipped. Returns the loss of the
    /// last epoch.
    pub fn train(&mut self, data: &[TrainingExample], epochs: usize, learning_rate: f64) -> f64 {
        let mut loss = 0.0;
        for epoch in 0..epochs {
            loss = data
                .iter()
                .filter(|ex| !ex.words.is_empty() && ex.words.len() == ex.labels.len())
                .map(|ex| self.sgd_step(ex, learning_rate))
                .sum();
            debug!(epoch, loss, "crf epoch");
        }
        loss
    }

    /// Most likely label sequence (Viterbi).
    pub fn predict<S: AsRef<str>>(&self, words: &[S]) -> Vec<Label> {
        if words.is_empty() {
            return Vec::new();
        }
        let features = extract_features(words);
        let n = features.len();
        let mut score = vec![[0.0; 3]; n];
        let mut back = vec![[0usize; 3]; n];
        score[0] = Label::ALL.map(|l| self.emission(l, &features[0]));
        for t in 1..n {
            for (j, cur) in Label::ALL.iter().enumerate() {
                let (best, value) = Label::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, prev)| (i, score[t - 1][i] + transition(*prev, *cur)))
                    .fold((0, f64::NEG_INFINITY), |acc, x| if x.1 > acc.1 { x } else { acc });
                score[t][j] = value + self.emission(*cur, &features[t]);
                back[t][j] = best;
            }
        }

        let mut best = (0..3).fold(0, |acc, j| {
            if score[n - 1][j] > score[n - 1][acc] {
                j
            } else {
                acc
            }
        });
        let mut path = vec![Label::O; n];
        for t in (0..n).rev() {
            path[t] = Label::ALL[best];
            best = back[t][best];
        }
        path
    }
}

/// Seed sequences for the built-in model.
pub fn seed_examples() -> Vec<TrainingExample> {
    use Label::{Affiliation as F, Author as A, O};
    vec![
        TrainingExample::new(&["\\author", "John", "Doe"], &[O, A, A]),
        TrainingExample::new(&["\\affiliation", "SomeUniversity"], &[O, F]),
        TrainingExample::new(&["\\institute", "AnotherInstitute"], &[O, F]),
        TrainingExample::new(&["Jane", "Smith", "Stanford", "University"], &[A, A, F, F]),
        TrainingExample::new(
            &["Alan", "Turing", "University", "of", "Manchester"],
            &[A, A, F, F, F],
        ),
        TrainingExample::new(&["Department", "of", "Computer", "Science"], &[F, F, F, F]),
        TrainingExample::new(&["Grace", "Hopper", "and", "Ada", "Lovelace"], &[A, A, O, A, A]),
        TrainingExample::new(
            &["Max", "Planck", "Institute", "for", "Informatics"],
            &[F, F, F, F, F],
        ),
        TrainingExample::new(&["Marie", "Curie", "CNRS", "Paris"], &[A, A, F, F]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> CrfModel {
        let mut model = CrfModel::new();
        model.train(&seed_examples(), 30, 0.1);
        model
    }

    #[test]
    fn test_features() {
        let feats = extract_features(&["Jane", "smith"]);
        assert_eq!(feats[0], vec!["WORD=Jane", "CAP", "BOS", "NEXT_WORD=smith"]);
        assert_eq!(feats[1], vec!["WORD=smith", "NOT_CAP", "PREV_WORD=Jane", "EOS"]);
    }

    #[test]
    fn test_marginals_are_distributions() {
        let model = trained();
        for row in model.marginals(&["Jane", "Doe", "University"]) {
            let total: f64 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_training_lowers_loss() {
        let mut model = CrfModel::new();
        let data = seed_examples();
        let first = model.train(&data, 1, 0.1);
        let later = model.train(&data, 20, 0.1);
        assert!(later < first);
        let as_affiliation = model.weight(Label::Affiliation, "WORD=University");
        assert!(as_affiliation > model.weight(Label::Author, "WORD=University"));
    }

    #[test]
    fn test_predict_training_sequence() {
        let model = trained();
        assert_eq!(
            model.predict(&["Jane", "Smith", "Stanford", "University"]),
            vec![Label::Author, Label::Author, Label::Affiliation, Label::Affiliation]
        );
        assert!(model.predict::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_untrained_model_prefers_first_label() {
        let model = CrfModel::new();
        assert_eq!(model.predict(&["x", "y"]), vec![Label::O, Label::O]);
    }
}
