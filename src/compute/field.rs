//! Scalar field grid: diffusion, decay and loss accounting.
//!
//! Every field is a flat row-major `f64` array indexed `y * width + x` on a
//! torus. Each tick a field is convolved with a 3x3 mass-conserving stencil,
//! then decayed exponentially. Whatever leaves the grid is credited to the
//! ledger: thermal losses as radiated heat, everything else as decayed mass.

use rayon::prelude::*;

use crate::schema::{ConfigError, FieldConfig, HEAT_FIELD, NECROMASS_FIELD, SimulationConfig};

use super::Ledger;

/// Handle to one field inside a [`FieldGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(usize);

impl FieldId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a field carries mass or energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Mass,
    Thermal,
}

/// 3x3 diffusion stencil, row-major, centre at index 4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionKernel {
    pub weights: [f64; 9],
}

impl DiffusionKernel {
    /// Build the stencil for orthogonal rate `r`.
    ///
    /// Orthogonal neighbours get `r`, diagonals `r / 2`, and the centre keeps
    /// the remainder, so the weights always sum to 1.
    pub fn from_rate(rate: f64) -> Self {
        let diag = rate / 2.0;
        let center = 1.0 - 4.0 * rate - 4.0 * diag;
        Self {
            weights: [
                diag, rate, diag, //
                rate, center, rate, //
                diag, rate, diag,
            ],
        }
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Weight at stencil offset `(dx, dy)`, each in `-1..=1`.
    #[inline]
    pub fn get(&self, dx: i64, dy: i64) -> f64 {
        self.weights[((dy + 1) * 3 + (dx + 1)) as usize]
    }
}

/// Wrap a signed coordinate onto a torus of the given size.
#[inline]
pub fn wrap_coord(coord: i64, size: usize) -> usize {
    coord.rem_euclid(size as i64) as usize
}

/// Convolve `input` with a 3x3 stencil under periodic boundaries.
pub fn diffuse_into(
    input: &[f64],
    kernel: &DiffusionKernel,
    width: usize,
    height: usize,
    output: &mut [f64],
) {
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for dy in -1..=1 {
                let sy = wrap_coord(y as i64 + dy, height);
                for dx in -1..=1 {
                    let sx = wrap_coord(x as i64 + dx, width);
                    sum += input[sy * width + sx] * kernel.get(dx, dy);
                }
            }
            output[y * width + x] = sum;
        }
    }
}

/// One named scalar field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Cell values, `y * width + x`.
    pub data: Vec<f64>,
    pub kernel: DiffusionKernel,
    pub decay: f64,
    /// Pre-allocated diffusion target (swapped with `data` every tick).
    scratch: Vec<f64>,
}

impl Field {
    fn from_config(config: &FieldConfig, size: usize) -> Self {
        let kind = if config.name == HEAT_FIELD {
            FieldKind::Thermal
        } else {
            FieldKind::Mass
        };
        Self {
            name: config.name.clone(),
            kind,
            data: vec![config.initial_value; size],
            kernel: DiffusionKernel::from_rate(config.diffusion),
            decay: config.decay,
            scratch: vec![0.0; size],
        }
    }

    /// Sum over all cells.
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Diffuse, decay and clamp. Returns the amount that left the field.
    fn advance(&mut self, width: usize, height: usize) -> f64 {
        diffuse_into(&self.data, &self.kernel, width, height, &mut self.scratch);
        std::mem::swap(&mut self.data, &mut self.scratch);

        let mut loss = 0.0;
        if self.decay > 0.0 {
            let keep = 1.0 - self.decay;
            for v in &mut self.data {
                let before = *v;
                *v *= keep;
                loss += before - *v;
            }
        }

        // Zeroing a negative cell raises the field total by its magnitude,
        // so the same magnitude comes off the loss booked for this tick.
        for v in &mut self.data {
            if *v < 0.0 {
                loss += *v;
                *v = 0.0;
            }
        }
        loss
    }
}

/// All fields of the microcosm sharing one toroidal grid.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    width: usize,
    height: usize,
    fields: Vec<Field>,
    heat: FieldId,
    necromass: FieldId,
}

impl FieldGrid {
    /// Allocate every configured field at its initial value.
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let size = config.grid_size();
        let fields: Vec<Field> = config
            .fields
            .iter()
            .map(|fc| Field::from_config(fc, size))
            .collect();

        let find = |name: &str| {
            fields
                .iter()
                .position(|f| f.name == name)
                .map(FieldId)
                .ok_or_else(|| ConfigError::MissingField(name.to_string()))
        };
        let heat = find(HEAT_FIELD)?;
        let necromass = find(NECROMASS_FIELD)?;

        Ok(Self {
            width: config.width,
            height: config.height,
            fields,
            heat,
            necromass,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell reached from `(x, y)` by offset `(dx, dy)` on the torus.
    #[inline]
    pub fn offset(&self, (x, y): (usize, usize), dx: i64, dy: i64) -> (usize, usize) {
        (
            wrap_coord(x as i64 + dx, self.width),
            wrap_coord(y as i64 + dy, self.height),
        )
    }

    /// Look up a field handle by name.
    pub fn resolve(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|f| f.name == name).map(FieldId)
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[inline]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    #[inline]
    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.0]
    }

    /// Iterate fields in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    #[inline]
    pub fn heat(&self) -> FieldId {
        self.heat
    }

    #[inline]
    pub fn necromass(&self) -> FieldId {
        self.necromass
    }

    #[inline]
    pub fn value(&self, id: FieldId, (x, y): (usize, usize)) -> f64 {
        self.fields[id.0].data[y * self.width + x]
    }

    #[inline]
    pub fn add(&mut self, id: FieldId, (x, y): (usize, usize), amount: f64) {
        let idx = y * self.width + x;
        self.fields[id.0].data[idx] += amount;
    }

    /// Cell that absorbs audited rounding drift: the grid centre.
    pub fn reconciliation_cell(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    /// Total mass held by all non-thermal fields.
    pub fn env_mass(&self) -> f64 {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Mass)
            .map(Field::total)
            .sum()
    }

    /// Total energy held by the heat field.
    pub fn heat_total(&self) -> f64 {
        self.fields[self.heat.0].total()
    }

    /// Diffuse and decay every field, crediting losses to the ledger.
    pub fn update(&mut self, ledger: &mut Ledger) {
        let width = self.width;
        let height = self.height;

        // Fields are independent here; ledger credits follow in field order.
        let losses: Vec<f64> = self
            .fields
            .par_iter_mut()
            .map(|field| field.advance(width, height))
            .collect();

        for (field, loss) in self.fields.iter().zip(losses) {
            match field.kind {
                FieldKind::Thermal => ledger.record_radiated(loss),
                FieldKind::Mass => ledger.record_decayed(loss),
            }
        }
    }
}
