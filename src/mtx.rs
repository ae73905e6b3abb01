//! Matrix-market coordinate format ingestion
//!
//! Reads the plain coordinate format: `%`-prefixed comment lines, a
//! `nrows ncols nnz` header, then one `i j [value]` line per entry with
//! 1-based indices. Indices are converted to 0-based on load; entries
//! without a value (or with values ignored) default to `T::one()`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::desc::Descriptor;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::matrix::Matrix;

/// Loader options
#[derive(Debug, Clone, Copy, Default)]
pub struct MtxOptions {
    /// Mirror each directed edge `i -> j` as `j -> i` (diagonal entries
    /// are not doubled)
    pub make_undirected: bool,
    /// Drop entries with `i == j`
    pub remove_self_loops: bool,
    /// Skip file values; every entry becomes `T::one()`
    pub ignore_values: bool,
}

/// Out-degree statistics over the row dimension
///
/// Computed for every input shape, square or rectangular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeStats {
    /// Smallest out-degree
    pub min: usize,
    /// Largest out-degree
    pub max: usize,
    /// Mean out-degree
    pub average: f64,
}

/// Parsed coordinate data
#[derive(Debug, Clone)]
pub struct MtxData<T: Element> {
    /// Row dimension
    pub n_rows: usize,
    /// Column dimension
    pub n_cols: usize,
    /// 0-based row indices
    pub rows: Vec<u32>,
    /// 0-based column indices
    pub cols: Vec<u32>,
    /// Entry values
    pub values: Vec<T>,
    /// Out-degree statistics of the loaded triples
    pub degree_stats: DegreeStats,
}

impl<T: Element> MtxData<T> {
    /// Number of loaded triples
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Overwrite every value, e.g. to weight a pattern-only file
    pub fn fill(&mut self, value: T) {
        for v in &mut self.values {
            *v = value;
        }
    }

    /// Build a matrix holding the loaded triples
    pub fn to_matrix(&self, lib: &Library) -> Result<Matrix<T>> {
        let m = Matrix::<T>::new(lib, self.n_rows, self.n_cols)?;
        m.build(&self.rows, &self.cols, &self.values, Descriptor::new())?;
        Ok(m)
    }
}

fn degree_stats(rows: &[u32], n_rows: usize) -> DegreeStats {
    let mut degree = vec![0usize; n_rows];
    for &r in rows {
        degree[r as usize] += 1;
    }

    let mut stats = DegreeStats {
        min: rows.len() + 1,
        max: 0,
        average: 0.0,
    };
    for &d in &degree {
        stats.min = stats.min.min(d);
        stats.max = stats.max.max(d);
        stats.average += d as f64;
    }
    if n_rows > 0 {
        stats.average /= n_rows as f64;
    } else {
        stats.min = 0;
    }
    stats
}

/// Read coordinate data from a stream
pub fn read_mtx<T: Element + FromStr>(
    reader: impl BufRead,
    options: &MtxOptions,
) -> Result<MtxData<T>> {
    let mut lines = reader.lines().enumerate();

    // Skip comments; the first payload line is the header.
    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line.map_err(|e| Error::invalid_argument("reader", e.to_string()))?;
                if !line.starts_with('%') {
                    break line;
                }
            }
            None => return Err(Error::invalid_argument("reader", "missing header line")),
        }
    };

    let mut header_fields = header.split_whitespace();
    let mut parse_dim = |name: &'static str| -> Result<usize> {
        header_fields
            .next()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| Error::invalid_argument(name, format!("bad header line '{header}'")))
    };
    let n_rows = parse_dim("n_rows")?;
    let n_cols = parse_dim("n_cols")?;
    let mut nnz = parse_dim("nnz")?;

    let mut rows: Vec<u32> = Vec::with_capacity(nnz);
    let mut cols: Vec<u32> = Vec::with_capacity(nnz);
    let mut values: Vec<T> = Vec::with_capacity(nnz);

    for (n, line) in lines {
        let line_no = n + 1;
        let line = line.map_err(|e| Error::invalid_argument("reader", e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let i: usize = fields
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::invalid_argument("reader", format!("bad entry on line {line_no}")))?;
        let j: usize = fields
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| Error::invalid_argument("reader", format!("bad entry on line {line_no}")))?;

        if !(1..=n_rows).contains(&i) {
            return Err(Error::invalid_argument(
                "reader",
                format!("row index out of bounds on line {line_no}"),
            ));
        }
        if !(1..=n_cols).contains(&j) {
            return Err(Error::invalid_argument(
                "reader",
                format!("column index out of bounds on line {line_no}"),
            ));
        }

        if options.remove_self_loops && i == j {
            nnz -= 1;
            continue;
        }

        rows.push((i - 1) as u32);
        cols.push((j - 1) as u32);
        values.push(match fields.next() {
            Some(token) if !options.ignore_values => token
                .parse::<T>()
                .map_err(|_| Error::invalid_argument("reader", format!("bad value on line {line_no}")))?,
            _ => T::one(),
        });
    }

    if rows.len() != nnz {
        return Err(Error::invalid_argument(
            "reader",
            format!("expected {nnz} entries, found {}", rows.len()),
        ));
    }

    if options.make_undirected {
        let directed = rows.len();
        for k in 0..directed {
            if rows[k] != cols[k] {
                rows.push(cols[k]);
                cols.push(rows[k]);
                values.push(values[k]);
            }
        }
    }

    let degree_stats = degree_stats(&rows, n_rows);
    debug!(
        "mtx: loaded {} x {} with {} entries (min.deg {}, max.deg {}, avg.deg {:.2})",
        n_rows,
        n_cols,
        rows.len(),
        degree_stats.min,
        degree_stats.max,
        degree_stats.average
    );

    Ok(MtxData {
        n_rows,
        n_cols,
        rows,
        cols,
        values,
        degree_stats,
    })
}

/// Read coordinate data from a file
pub fn load_mtx<T: Element + FromStr>(
    path: impl AsRef<Path>,
    options: &MtxOptions,
) -> Result<MtxData<T>> {
    let file = File::open(path.as_ref())
        .map_err(|e| Error::invalid_argument("path", e.to_string()))?;
    read_mtx(BufReader::new(file), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> MtxOptions {
        MtxOptions::default()
    }

    #[test]
    fn test_basic_load() {
        let src = "%%MatrixMarket matrix coordinate real general\n% comment\n3 3 2\n1 2 4.0\n3 1 5.0\n";
        let data = read_mtx::<f32>(src.as_bytes(), &opts()).unwrap();
        assert_eq!(data.n_rows, 3);
        assert_eq!(data.n_cols, 3);
        assert_eq!(data.rows, vec![0, 2]);
        assert_eq!(data.cols, vec![1, 0]);
        assert_eq!(data.values, vec![4.0, 5.0]);
    }

    #[test]
    fn test_self_loop_removal() {
        let src = "3 3 4\n1 1 1\n1 2 2\n2 3 3\n3 3 4\n";
        let data = read_mtx::<f32>(
            src.as_bytes(),
            &MtxOptions {
                remove_self_loops: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(data.nnz(), 2);
        assert_eq!(data.rows, vec![0, 1]);
        assert_eq!(data.cols, vec![1, 2]);
        assert_eq!(data.values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_make_undirected() {
        let src = "3 3 2\n1 2 7.0\n2 2 1.0\n";
        let data = read_mtx::<f32>(
            src.as_bytes(),
            &MtxOptions {
                make_undirected: true,
                ..opts()
            },
        )
        .unwrap();
        // The diagonal entry is not mirrored.
        assert_eq!(data.nnz(), 3);
        assert_eq!(data.rows, vec![0, 1, 1]);
        assert_eq!(data.cols, vec![1, 1, 0]);
        assert_eq!(data.values, vec![7.0, 1.0, 7.0]);
    }

    #[test]
    fn test_missing_values_default_to_one() {
        let src = "2 2 2\n1 2\n2 1\n";
        let data = read_mtx::<i32>(src.as_bytes(), &opts()).unwrap();
        assert_eq!(data.values, vec![1, 1]);
    }

    #[test]
    fn test_ignore_values() {
        let src = "2 2 1\n1 2 42\n";
        let data = read_mtx::<i32>(
            src.as_bytes(),
            &MtxOptions {
                ignore_values: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(data.values, vec![1]);
    }

    #[test]
    fn test_out_of_range_row_fails() {
        let src = "2 2 1\n3 1 1.0\n";
        assert!(read_mtx::<f32>(src.as_bytes(), &opts()).is_err());
    }

    #[test]
    fn test_out_of_range_col_fails() {
        let src = "2 2 1\n1 3 1.0\n";
        assert!(read_mtx::<f32>(src.as_bytes(), &opts()).is_err());
    }

    #[test]
    fn test_nnz_mismatch_fails() {
        let src = "2 2 3\n1 1 1.0\n";
        assert!(read_mtx::<f32>(src.as_bytes(), &opts()).is_err());
    }

    #[test]
    fn test_rectangular_degree_stats() {
        let src = "2 4 3\n1 1 1.0\n1 4 1.0\n2 2 1.0\n";
        let data = read_mtx::<f32>(src.as_bytes(), &opts()).unwrap();
        assert_eq!(data.degree_stats.min, 1);
        assert_eq!(data.degree_stats.max, 2);
        assert!((data.degree_stats.average - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_fill_overwrites_values() {
        let src = "2 2 2\n1 2 5.0\n2 1 6.0\n";
        let mut data = read_mtx::<f32>(src.as_bytes(), &opts()).unwrap();
        data.fill(1.0);
        assert_eq!(data.values, vec![1.0, 1.0]);
    }
}
