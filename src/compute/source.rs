//! Boundary inflows: rain and vents.

use rand::Rng;

use crate::schema::{ConfigError, SimulationConfig, SourceConfig};

use super::{FieldGrid, FieldId, FieldKind, Ledger};

/// A source resolved against the grid. Vent cells and amounts are fixed here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveSource {
    /// Uniform increment on every cell.
    Rain { field: FieldId, amount: f64 },
    /// Point injection on one cell.
    Vent {
        field: FieldId,
        amount: f64,
        position: (usize, usize),
    },
}

impl ActiveSource {
    pub fn field(&self) -> FieldId {
        match *self {
            ActiveSource::Rain { field, .. } | ActiveSource::Vent { field, .. } => field,
        }
    }
}

/// Applies every configured source once per tick.
#[derive(Debug, Clone, Default)]
pub struct SourceInjector {
    sources: Vec<ActiveSource>,
}

impl SourceInjector {
    /// Resolve source declarations. Vents are expanded `count` times; each
    /// instance draws its amount (from `range`) and cell (unless `position`
    /// is set) once.
    pub fn new<R: Rng + ?Sized>(
        config: &SimulationConfig,
        fields: &FieldGrid,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        let mut sources = Vec::new();
        for decl in &config.sources {
            let field = fields
                .resolve(decl.field())
                .ok_or_else(|| ConfigError::UnknownSourceField(decl.field().to_string()))?;

            match decl {
                SourceConfig::Rain { amount, .. } => {
                    sources.push(ActiveSource::Rain {
                        field,
                        amount: *amount,
                    });
                }
                SourceConfig::Vent {
                    amount,
                    range,
                    position,
                    count,
                    ..
                } => {
                    for _ in 0..*count {
                        let amount = match *range {
                            Some((lo, hi)) => rng.gen_range(lo..=hi),
                            None => *amount,
                        };
                        let position = match *position {
                            Some(cell) => cell,
                            None => (
                                rng.gen_range(0..fields.width()),
                                rng.gen_range(0..fields.height()),
                            ),
                        };
                        sources.push(ActiveSource::Vent {
                            field,
                            amount,
                            position,
                        });
                    }
                }
            }
        }
        log::debug!("resolved {} active sources", sources.len());
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[ActiveSource] {
        &self.sources
    }

    /// Inject every source and credit the ledger.
    ///
    /// Mass inflows go to `mass_sourced`; heat inflows go to
    /// `energy_generated` and never touch the mass ledger.
    pub fn apply(&self, fields: &mut FieldGrid, ledger: &mut Ledger) {
        let cells = (fields.width() * fields.height()) as f64;
        for source in &self.sources {
            let injected = match *source {
                ActiveSource::Rain { field, amount } => {
                    for v in &mut fields.field_mut(field).data {
                        *v += amount;
                    }
                    amount * cells
                }
                ActiveSource::Vent {
                    field,
                    amount,
                    position,
                } => {
                    fields.add(field, position, amount);
                    amount
                }
            };
            match fields.field(source.field()).kind {
                FieldKind::Mass => ledger.record_sourced(injected),
                FieldKind::Thermal => ledger.record_generated(injected),
            }
        }
    }
}
