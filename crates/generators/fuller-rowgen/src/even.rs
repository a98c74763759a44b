use crate::{ConfigError, RowGeneratorConfig};
use fuller_core::rowgen::{RowGeneration, RowMapping};
use log::debug;

/// Sweeps evenly spaced rows across the bank.
///
/// Iteration `n` yields the logical rows `n, n + 2, n + 4, ...` wrapped at
/// `max_row`, so successive iterations walk every second-neighbor group over
/// the whole row range.
#[derive(Debug, Clone)]
pub struct EvenRows {
    nr_rows: usize,
    max_row: usize,
    mapping: RowMapping,
}

impl EvenRows {
    /// Creates the strategy from `config` (`nr_rows`, `max_row`, `mapping`).
    pub fn new(config: &RowGeneratorConfig) -> Result<Self, ConfigError> {
        for (parameter, value) in [("nr_rows", config.nr_rows), ("max_row", config.max_row)] {
            if value == 0 {
                return Err(ConfigError::NotPositive { strategy: "even_rows", parameter });
            }
        }
        Ok(EvenRows {
            nr_rows: config.nr_rows,
            max_row: config.max_row,
            mapping: config.mapping,
        })
    }
}

impl RowGeneration for EvenRows {
    fn generate_rows(&mut self, iteration: usize) -> Vec<usize> {
        let rows: Vec<usize> = (0..self.nr_rows)
            .map(|i| {
                self.mapping
                    .logical_to_physical((iteration + 2 * i) % self.max_row)
            })
            .collect();
        debug!("even_rows iteration {}: {:?}", iteration, rows);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(nr_rows: usize, max_row: usize) -> RowGeneratorConfig {
        RowGeneratorConfig {
            nr_rows,
            max_row,
            start_row: 0,
            seed: None,
            mapping: RowMapping::Trivial,
        }
    }

    #[test]
    fn yields_every_second_row_from_the_iteration() {
        let mut rows = EvenRows::new(&config(3, 64)).unwrap();
        assert_eq!(rows.generate_rows(0), [0, 2, 4]);
        assert_eq!(rows.generate_rows(5), [5, 7, 9]);
    }

    #[test]
    fn wraps_at_max_row() {
        let mut rows = EvenRows::new(&config(3, 8)).unwrap();
        assert_eq!(rows.generate_rows(6), [6, 0, 2]);
    }

    #[test]
    fn applies_the_row_mapping() {
        let mut config = config(2, 64);
        config.mapping = RowMapping::TypeB;
        let mut rows = EvenRows::new(&config).unwrap();
        assert_eq!(rows.generate_rows(1), [2, 6]);
    }

    #[test]
    fn zero_rows_is_rejected() {
        assert_eq!(
            EvenRows::new(&config(0, 64)).unwrap_err(),
            ConfigError::NotPositive { strategy: "even_rows", parameter: "nr_rows" }
        );
    }
}
