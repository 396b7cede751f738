use super::*;
use approx::assert_abs_diff_eq;
use ndarray::{array, s};
use ndarray_rand::RandomExt;
use rand_distr::Normal;

fn seeded_rng() -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(0)
}

// two groups of observations separated along a handful of genes, plus noise
fn planted_expression(n_obs: usize, n_genes: usize) -> ExpressionMatrix {
    let mut rng = seeded_rng();
    let noise = Normal::new(0.0f64, 0.2f64).unwrap();
    let mut m = Array2::random_using((n_obs, n_genes), noise, &mut rng);
    m.slice_mut(s![..n_obs / 2, ..n_genes.min(5)]).mapv_inplace(|v| v + 4.0);
    let obs = (0..n_obs).map(|i| format!("cell{i}")).collect();
    let genes = (0..n_genes).map(|i| format!("gene{i}")).collect();
    ExpressionMatrix::new(obs, genes, m).unwrap()
}

#[test]
fn test_pca_planted_axis() {
    let e = planted_expression(80, 30);
    let opts = PcaOptions {
        n_comps: 5,
        ..PcaOptions::default()
    };
    let pca = compute_pca(&e, &vec![true; 30], 0, &opts).unwrap();

    assert_eq!(pca.components.dim(), (30, 5));
    assert_eq!(pca.components.cols()[0], "PC1");
    assert_eq!(pca.components.rows()[3], "gene3");
    assert_eq!(pca.means.len(), 30);

    // PC1 loads on the five planted genes with positive sign
    let pc1 = pca.components.column(0);
    for g in 0..5 {
        assert!(pc1[g] > 0.35, "gene {g}: {}", pc1[g]);
    }
    for g in 5..30 {
        assert!(pc1[g].abs() < 0.2);
    }
    assert!(pca.explained_variance_ratio[0] > 0.5);
    for i in 1..5 {
        assert!(pca.explained_variance[i - 1] >= pca.explained_variance[i]);
    }

    let gram = pca.components.values().t().dot(&pca.components.values());
    assert_abs_diff_eq!(gram, Array2::<f64>::eye(5), epsilon = 1e-6);
}

#[test]
fn test_pca_gene_mask_and_clamp() {
    let e = planted_expression(6, 30);
    let mut mask = vec![false; 30];
    for g in [1, 4, 7, 9, 20, 22, 25, 29] {
        mask[g] = true;
    }
    let pca = compute_pca(&e, &mask, 3, &PcaOptions::default()).unwrap();
    // at most observations - 1 components
    assert_eq!(pca.components.ncols(), 5);
    assert_eq!(pca.components.rows(), &["gene1", "gene4", "gene7", "gene9", "gene20", "gene22", "gene25", "gene29"]);
}

#[test]
fn test_pca_cell_select_is_seeded() {
    let e = planted_expression(60, 20);
    let opts = PcaOptions {
        n_comps: 3,
        cell_select: Some(30),
        ..PcaOptions::default()
    };
    let a = compute_pca(&e, &vec![true; 20], 11, &opts).unwrap();
    let b = compute_pca(&e, &vec![true; 20], 11, &opts).unwrap();
    assert_eq!(a.components, b.components);
    assert_eq!(a.means, b.means);
}

#[test]
fn test_pca_errors() {
    let e = planted_expression(10, 4);
    assert!(compute_pca(&e, &[false; 4], 0, &PcaOptions::default()).is_err());
    assert!(compute_pca(&e, &[true; 3], 0, &PcaOptions::default()).is_err());
    let one = planted_expression(1, 4);
    assert!(compute_pca(&one, &[true; 4], 0, &PcaOptions::default()).is_err());
}

#[test]
fn test_filter_components() {
    let comps = LabeledMatrix::from_labels(
        &["a", "b", "c"],
        &["PC1", "PC2", "PC3", "PC4"],
        array![[0.9, 0.1, 0.5, 0.0], [0.1, 0.9, 0.5, 0.0], [0.0, 0.1, 0.5, 1.0]],
    )
    .unwrap();
    // z-scores of the explained variances: 1.32, 0.15, -0.44, -1.02
    let ev = array![4.0, 2.0, 1.0, 0.0];
    let ratio = array![0.5, 0.25, 0.125, 0.0];

    let kept = filter_components(&comps, &ev, &ratio, &FilterPcsOptions::default()).unwrap();
    assert_eq!(kept.ncols(), 0);
    assert_eq!(kept.nrows(), 3);

    let lax = FilterPcsOptions {
        zscore_threshold: 0.0,
        max_pcs: None,
    };
    let kept = filter_components(&comps, &ev, &ratio, &lax).unwrap();
    assert_eq!(kept.cols(), &["PC1", "PC2"]);
    assert_eq!(kept.values(), array![[0.9, 0.1], [0.1, 0.9], [0.0, 0.1]]);

    // PC4 explains nothing and is dropped whatever the threshold
    let all = FilterPcsOptions {
        zscore_threshold: -5.0,
        max_pcs: None,
    };
    let kept = filter_components(&comps, &ev, &ratio, &all).unwrap();
    assert_eq!(kept.cols(), &["PC1", "PC2", "PC3"]);

    let capped = FilterPcsOptions {
        zscore_threshold: -5.0,
        max_pcs: Some(1),
    };
    let kept = filter_components(&comps, &ev, &ratio, &capped).unwrap();
    assert_eq!(kept.cols(), &["PC1"]);

    let flat = filter_components(
        &comps,
        &array![1.0, 1.0, 1.0, 1.0],
        &array![0.25, 0.25, 0.25, 0.25],
        &FilterPcsOptions::default(),
    )
    .unwrap();
    assert_eq!(flat.ncols(), 4);

    assert!(filter_components(&comps, &array![1.0], &ratio, &lax).is_err());
}

#[test]
fn test_project_chunking() {
    let e = planted_expression(37, 12);
    let pca = compute_pca(
        &e,
        &vec![true; 12],
        0,
        &PcaOptions {
            n_comps: 4,
            ..PcaOptions::default()
        },
    )
    .unwrap();

    let whole = project(&e, &pca.components, &pca.means, &ProjectOptions::default()).unwrap();
    let chunked = project(&e, &pca.components, &pca.means, &ProjectOptions { chunk_size: Some(5) }).unwrap();
    assert_eq!(whole.rows(), e.observations.as_slice());
    assert_eq!(whole.cols(), pca.components.cols());
    assert_abs_diff_eq!(whole.values(), chunked.values(), epsilon = 1e-12);

    // direct computation
    let mut centered = e.matrix.clone();
    centered -= &pca.means;
    let direct = centered.dot(&pca.components.values());
    assert_abs_diff_eq!(whole.values(), direct.view(), epsilon = 1e-9);

    assert!(project(&e, &pca.components, &pca.means, &ProjectOptions { chunk_size: Some(0) }).is_err());
}

#[test]
fn test_project_by_gene_label() {
    let e = ExpressionMatrix::new(
        vec!["x".into(), "y".into()],
        vec!["g0".into(), "g1".into(), "g2".into()],
        array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
    )
    .unwrap();
    let comps = LabeledMatrix::from_labels(&["g2", "g0"], &["PC1"], array![[1.0], [-1.0]]).unwrap();
    let r = project(&e, &comps, &array![0.0, 0.0], &ProjectOptions::default()).unwrap();
    assert_eq!(r.values(), array![[2.0], [2.0]]);

    let missing = LabeledMatrix::from_labels(&["g9"], &["PC1"], array![[1.0]]).unwrap();
    assert!(project(&e, &missing, &array![0.0], &ProjectOptions::default()).is_err());
}
