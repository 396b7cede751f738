//! Summarize a pairwise test into a single separation score

use crate::diff_exp::DiffExpResult;
use noisy_float::types::n64;

/// Per-gene cap on the contribution of `-log10(padj)` to the score.
pub const MAX_GENE_SCORE: f64 = 20.0;

/// Criteria for calling a gene differentially expressed, and for calling two groups distinct
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct DeThresholds {
    /// adjusted p-value must be below this
    pub padj_thresh: f64,
    /// absolute log fold change must exceed this
    pub lfc_thresh: f64,
    /// expression above this counts as "expressed"
    pub low_thresh: f64,
    /// fraction expressing in the higher group must exceed this
    pub q1_thresh: f64,
    /// if set, fraction expressing in the lower group must be below this
    pub q2_thresh: Option<f64>,
    /// (q1 - q2) / max(q1, q2) must exceed this
    pub qdiff_thresh: f64,
    /// minimum number of DE genes for two groups to stay separate
    pub min_genes: usize,
    /// minimum total score for two groups to stay separate
    pub score_thresh: f64,
}

impl Default for DeThresholds {
    fn default() -> Self {
        DeThresholds {
            padj_thresh: 0.01,
            lfc_thresh: 1.0,
            low_thresh: 1.0,
            q1_thresh: 0.5,
            q2_thresh: None,
            qdiff_thresh: 0.7,
            min_genes: 5,
            score_thresh: 150.0,
        }
    }
}

/// DE genes and total score for one pair of groups
#[derive(Debug, Clone, PartialEq)]
pub struct DeScore {
    /// sum over DE genes of `min(-log10(padj), MAX_GENE_SCORE)`
    pub score: f64,
    /// genes higher in group a, most significant first
    pub up_genes: Vec<usize>,
    /// genes higher in group b, most significant first
    pub down_genes: Vec<usize>,
}

impl DeScore {
    /// total number of DE genes in either direction
    pub fn num_de_genes(&self) -> usize {
        self.up_genes.len() + self.down_genes.len()
    }

    /// true if the pair clears both the score and the gene-count threshold
    pub fn is_separable(&self, th: &DeThresholds) -> bool {
        self.score >= th.score_thresh && self.num_de_genes() >= th.min_genes
    }
}

fn passes(th: &DeThresholds, padj: f64, lfc: f64, q_high: f64, q_low: f64) -> bool {
    if !(padj < th.padj_thresh) || lfc <= th.lfc_thresh || q_high <= th.q1_thresh {
        return false;
    }
    if let Some(q2) = th.q2_thresh {
        if q_low >= q2 {
            return false;
        }
    }
    let qmax = q_high.max(q_low);
    qmax > 0.0 && (q_high - q_low) / qmax > th.qdiff_thresh
}

/// Score a DE result against `th`.
pub fn de_score(res: &DiffExpResult, th: &DeThresholds) -> DeScore {
    let mut up = Vec::new();
    let mut down = Vec::new();
    for g in 0..res.len() {
        let padj = res.adjusted_p_values[g];
        let lfc = res.log_fold_change[g];
        let (qa, qb) = (res.frac_a[g], res.frac_b[g]);
        if passes(th, padj, lfc, qa, qb) {
            up.push(g);
        } else if passes(th, padj, -lfc, qb, qa) {
            down.push(g);
        }
    }

    let key = |&g: &usize| (n64(res.adjusted_p_values[g]), g);
    up.sort_by_key(key);
    down.sort_by_key(key);

    let score = up
        .iter()
        .chain(down.iter())
        .map(|&g| (-res.adjusted_p_values[g].log10()).min(MAX_GENE_SCORE))
        .sum();

    DeScore {
        score,
        up_genes: up,
        down_genes: down,
    }
}
