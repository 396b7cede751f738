use anyhow::{bail, format_err, Error};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Dense matrix with a string label attached to every row and every column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLabeledMatrix")]
pub struct LabeledMatrix {
    rows: Vec<String>,
    cols: Vec<String>,
    values: Array2<f64>,
}

// deserialized fields, checked by `LabeledMatrix::new` before use
#[derive(Deserialize)]
struct RawLabeledMatrix {
    rows: Vec<String>,
    cols: Vec<String>,
    values: Array2<f64>,
}

impl TryFrom<RawLabeledMatrix> for LabeledMatrix {
    type Error = Error;

    fn try_from(raw: RawLabeledMatrix) -> Result<Self, Self::Error> {
        LabeledMatrix::new(raw.rows, raw.cols, raw.values)
    }
}

/// Per-gene projection coefficients: genes x components.
pub type GeneComponentMatrix = LabeledMatrix;
/// Known artifact directions expressed in the same row space as the components.
pub type KnownModeMatrix = LabeledMatrix;
/// Observations x reduced dimensions, the input to graph clustering.
pub type ReducedMatrix = LabeledMatrix;

impl LabeledMatrix {
    pub fn new(rows: Vec<String>, cols: Vec<String>, values: Array2<f64>) -> Result<LabeledMatrix, Error> {
        let (nrows, ncols) = values.dim();
        if rows.len() != nrows || cols.len() != ncols {
            bail!(
                "label counts {} x {} do not match matrix shape {} x {}",
                rows.len(),
                cols.len(),
                nrows,
                ncols
            );
        }
        let mut seen = HashSet::with_capacity(rows.len());
        if let Some(dup) = rows.iter().find(|r| !seen.insert(r.as_str())) {
            bail!("duplicate row label {}", dup);
        }
        Ok(LabeledMatrix { rows, cols, values })
    }

    /// Build from string slices, convenient for fixtures.
    pub fn from_labels(rows: &[&str], cols: &[&str], values: Array2<f64>) -> Result<LabeledMatrix, Error> {
        LabeledMatrix::new(
            rows.iter().map(ToString::to_string).collect(),
            cols.iter().map(ToString::to_string).collect(),
            values,
        )
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.values.column(j)
    }

    /// Map from row label to row position.
    pub fn row_index(&self) -> HashMap<&str, usize> {
        self.rows.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect()
    }

    /// Select rows by position, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> LabeledMatrix {
        LabeledMatrix {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            cols: self.cols.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Select columns by position, in the given order.
    pub fn select_cols(&self, indices: &[usize]) -> LabeledMatrix {
        LabeledMatrix {
            rows: self.rows.clone(),
            cols: indices.iter().map(|&j| self.cols[j].clone()).collect(),
            values: self.values.select(Axis(1), indices),
        }
    }
}

/// Log-normalized expression values, observations x genes, plus any precomputed latent spaces
/// keyed by name.
#[derive(Clone, Debug)]
pub struct ExpressionMatrix {
    pub observations: Vec<String>,
    pub genes: Vec<String>,
    pub matrix: Array2<f64>,
    pub latent: BTreeMap<String, Array2<f64>>,
}

impl ExpressionMatrix {
    pub fn new(observations: Vec<String>, genes: Vec<String>, matrix: Array2<f64>) -> Result<ExpressionMatrix, Error> {
        let (n_obs, n_genes) = matrix.dim();
        if observations.len() != n_obs || genes.len() != n_genes {
            return Err(format_err!(
                "expression matrix is {} x {} but has {} observation and {} gene labels",
                n_obs,
                n_genes,
                observations.len(),
                genes.len()
            ));
        }
        let mut seen = HashSet::with_capacity(n_obs);
        if let Some(dup) = observations.iter().find(|o| !seen.insert(o.as_str())) {
            bail!("duplicate observation id {}", dup);
        }
        Ok(ExpressionMatrix {
            observations,
            genes,
            matrix,
            latent: BTreeMap::new(),
        })
    }

    /// Attach a precomputed embedding (observations x dims) under `name`.
    pub fn with_latent(mut self, name: &str, embedding: Array2<f64>) -> Result<ExpressionMatrix, Error> {
        if embedding.nrows() != self.observations.len() {
            bail!(
                "latent space {} has {} rows, expected {}",
                name,
                embedding.nrows(),
                self.observations.len()
            );
        }
        self.latent.insert(name.to_string(), embedding);
        Ok(self)
    }

    pub fn n_obs(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn gene_index(&self) -> HashMap<&str, usize> {
        self.genes.iter().enumerate().map(|(i, g)| (g.as_str(), i)).collect()
    }

    pub fn observation_index(&self) -> HashMap<&str, usize> {
        self.observations
            .iter()
            .enumerate()
            .map(|(i, o)| (o.as_str(), i))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_validation() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(LabeledMatrix::from_labels(&["a", "b"], &["x", "y"], m.clone()).is_ok());
        assert!(LabeledMatrix::from_labels(&["a"], &["x", "y"], m.clone()).is_err());
        assert!(LabeledMatrix::from_labels(&["a", "a"], &["x", "y"], m).is_err());
    }

    #[test]
    fn test_select() {
        let m = LabeledMatrix::from_labels(
            &["a", "b", "c"],
            &["x", "y"],
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        )
        .unwrap();
        let r = m.select_rows(&[2, 0]);
        assert_eq!(r.rows(), &["c", "a"]);
        assert_eq!(r.values(), array![[5.0, 6.0], [1.0, 2.0]]);
        let c = m.select_cols(&[1]);
        assert_eq!(c.cols(), &["y"]);
        assert_eq!(c.values(), array![[2.0], [4.0], [6.0]]);
    }

    #[test]
    fn test_serde_roundtrip_labels() {
        let m = LabeledMatrix::from_labels(&["a"], &["x", "y"], array![[1.0, 2.0]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: LabeledMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let short = r#"{"rows": ["a", "b", "c"], "cols": ["batch"],
            "values": {"v": 1, "dim": [2, 1], "data": [0.0, 1.0]}}"#;
        let err = serde_json::from_str::<LabeledMatrix>(short).unwrap_err();
        assert!(err.to_string().contains("do not match matrix shape"), "{err}");

        let dup = r#"{"rows": ["a", "a"], "cols": ["batch"],
            "values": {"v": 1, "dim": [2, 1], "data": [0.0, 1.0]}}"#;
        assert!(serde_json::from_str::<LabeledMatrix>(dup).is_err());
    }

    #[test]
    fn test_expression_latent_shape() {
        let e = ExpressionMatrix::new(
            vec!["c1".into(), "c2".into()],
            vec!["g1".into()],
            array![[0.0], [1.0]],
        )
        .unwrap();
        assert!(e.clone().with_latent("X_scvi", Array2::zeros((2, 3))).is_ok());
        assert!(e.with_latent("X_scvi", Array2::zeros((3, 3))).is_err());
    }
}
