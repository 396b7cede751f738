use statrs::distribution::{ContinuousCDF, StudentsT};
use std::cmp::Ordering;

/// Two-sided p-value of a Student t statistic with `df` degrees of freedom. Undefined
/// statistics or degrees of freedom give 1.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if t.is_nan() || !(df > 0.0) {
        return 1.0;
    }
    if t.is_infinite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.cdf(-t.abs())).min(1.0),
        Err(_) => 1.0,
    }
}

/// Benjamini-Hochberg adjustment of `(index, p-value)` pairs. The result is ordered by
/// descending p-value; NaNs sort to the front.
pub fn adjusted_pvalue_bh(pvalue: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let mut arr = pvalue.to_vec();
    arr.sort_by(|&(_, a), &(_, b)| match a.partial_cmp(&b) {
        Some(o) => o.reverse(),
        None => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            _ => Ordering::Greater,
        },
    });

    // q = min(1, cumulative min of p * n / rank), walking from the largest p-value down
    let len = arr.len() as f64;
    let mut min = f64::MAX;
    for (idx, (_, val)) in arr.iter_mut().enumerate() {
        *val *= len / (len - idx as f64);
        if *val < min {
            min = *val
        }
        *val = min.min(1.0);
    }

    arr
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_student_t() {
        // 97.5% quantile of t(10)
        assert_approx_eq!(student_t_two_sided(2.228_138_851_986_274, 10.0), 0.05, 1e-9);
        assert_approx_eq!(student_t_two_sided(-2.228_138_851_986_274, 10.0), 0.05, 1e-9);
        assert_approx_eq!(student_t_two_sided(0.0, 5.0), 1.0, 1e-12);
        assert_eq!(student_t_two_sided(f64::INFINITY, 5.0), 0.0);
        assert_eq!(student_t_two_sided(f64::NAN, 5.0), 1.0);
        assert_eq!(student_t_two_sided(2.0, 0.0), 1.0);
        assert_eq!(student_t_two_sided(2.0, f64::NAN), 1.0);

        // far tail keeps its precision
        let p = student_t_two_sided(40.0, 58.0);
        assert!(p > 0.0 && p < 1e-30, "{p}");
    }

    #[test]
    fn test_adjusted_pvalue_bh() {
        let data = [
            0.34f64, 0.594, 0.212, 0.384, 0.074, 0.94, 0.275, 0.696, 0.269, 0.341, 0.06, 0.008, 0.569, 0.986,
            0.042, 0.251, 0.942, 0.222, 0.762, 0.001, 0.975, 0.216, 0.205, 0.041, 0.039,
        ];
        let pv_value: Vec<(usize, f64)> = data.iter().copied().enumerate().collect();

        let expected = [
            0.5328125f64,
            0.781578947368421,
            0.49107142857142866,
            0.5647058823529413,
            0.2642857142857143,
            0.986,
            0.49107142857142866,
            0.8699999999999999,
            0.49107142857142866,
            0.5328125,
            0.25,
            0.1,
            0.781578947368421,
            0.986,
            0.21000000000000002,
            0.49107142857142866,
            0.986,
            0.49107142857142866,
            0.9071428571428571,
            0.025,
            0.986,
            0.49107142857142866,
            0.49107142857142866,
            0.21000000000000002,
            0.21000000000000002,
        ];

        let mut adjusted = adjusted_pvalue_bh(&pv_value);
        adjusted.sort_by_key(|&(i, _)| i);
        for ((i, q), e) in adjusted.into_iter().zip(expected) {
            assert_approx_eq!(q, e, 1e-12);
            assert!(q >= data[i] || q == 1.0);
        }
    }
}
