// ==========================================
// PV PAN Tool - Field mapper
// ==========================================
// Maps raw tokens onto canonical fields through the candidate-key
// table and performs all type/unit coercion. This is the only place
// that knows vendor dialects; the tokenizer and validator stay
// dialect-agnostic.
//
// Resolution rule: the first matching raw key in file order wins,
// later duplicates are ignored with a note. A value that fails
// coercion leaves the field absent (never defaulted) with a warning.
// ==========================================

use crate::config::key_table::{CanonicalField, KeyTable};
use crate::domain::module::{CurvePoint, ParseWarning};
use crate::parser::tokenizer::TokenizedFile;
use std::collections::HashSet;

// ==========================================
// Mapper output
// ==========================================

/// A curve block after coordinate coercion, before invariant checks.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSeries {
    pub label: String,
    pub points: Vec<CurvePoint>,
}

/// Canonical fields extracted from one file. Every field is optional;
/// "no value" is the explicit absence marker throughout the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MappedFields {
    // ===== Identity =====
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub data_source: Option<String>,

    // ===== Electrical (STC) =====
    pub pmax_stc: Option<f64>,
    pub vmp_stc: Option<f64>,
    pub imp_stc: Option<f64>,
    pub voc_stc: Option<f64>,
    pub isc_stc: Option<f64>,

    // ===== Temperature coefficients (magnitudes, %/°C) =====
    pub temp_coeff_pmax: Option<f64>,
    pub temp_coeff_voc: Option<f64>,
    pub temp_coeff_isc: Option<f64>,

    // ===== Reference / configuration =====
    pub g_ref: Option<f64>,
    pub t_ref: Option<f64>,
    pub noct: Option<f64>,
    pub bypass_diodes: Option<i64>,
    pub max_system_voltage: Option<f64>,
    pub r_series: Option<f64>,
    pub r_shunt: Option<f64>,

    // ===== Bifacial =====
    pub bifaciality_factor: Option<f64>,

    // ===== Mechanical =====
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub thickness_mm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub cells_in_series: Option<i64>,
    pub cells_in_parallel: Option<i64>,

    // ===== Technology =====
    pub technology: Option<String>,

    // ===== Curve blocks (coerced, not yet validated) =====
    pub candidate_series: Vec<CandidateSeries>,
}

// ==========================================
// FieldMapper
// ==========================================
pub struct FieldMapper {
    table: KeyTable,
}

impl FieldMapper {
    pub fn new(table: KeyTable) -> Self {
        Self { table }
    }

    /// Map a tokenized file onto canonical fields.
    ///
    /// # Returns
    /// - MappedFields plus the coercion warnings accumulated on the way
    pub fn map(&self, tokens: &TokenizedFile) -> (MappedFields, Vec<ParseWarning>) {
        let mut fields = MappedFields::default();
        let mut warnings = Vec::new();
        let mut seen: HashSet<CanonicalField> = HashSet::new();

        for pair in &tokens.pairs {
            let Some(field) = self.table.resolve(&pair.key) else {
                // vendor extras we have no canonical home for
                continue;
            };

            if !seen.insert(field) {
                warnings.push(ParseWarning::note(
                    field.as_str(),
                    format!(
                        "duplicate key '{}' on line {} ignored (first occurrence wins)",
                        pair.key, pair.line
                    ),
                ));
                continue;
            }

            self.apply(field, &pair.value, &mut fields, &mut warnings);
        }

        self.finalize_units(&mut fields, &mut warnings);
        self.coerce_series(tokens, &mut fields, &mut warnings);

        (fields, warnings)
    }

    // ==========================================
    // Per-field coercion
    // ==========================================
    fn apply(
        &self,
        field: CanonicalField,
        raw: &str,
        fields: &mut MappedFields,
        warnings: &mut Vec<ParseWarning>,
    ) {
        match field {
            // ===== string fields =====
            CanonicalField::Manufacturer => fields.manufacturer = non_empty(raw),
            CanonicalField::Model => fields.model = non_empty(raw),
            CanonicalField::DataSource => fields.data_source = non_empty(raw),
            CanonicalField::Technology => fields.technology = non_empty(raw),

            // ===== plain numeric fields =====
            CanonicalField::PmaxStc => fields.pmax_stc = numeric(field, raw, warnings),
            CanonicalField::VmpStc => fields.vmp_stc = numeric(field, raw, warnings),
            CanonicalField::ImpStc => fields.imp_stc = numeric(field, raw, warnings),
            CanonicalField::VocStc => fields.voc_stc = numeric(field, raw, warnings),
            CanonicalField::IscStc => fields.isc_stc = numeric(field, raw, warnings),
            CanonicalField::GRef => fields.g_ref = numeric(field, raw, warnings),
            CanonicalField::TRef => fields.t_ref = numeric(field, raw, warnings),
            CanonicalField::Noct => fields.noct = numeric(field, raw, warnings),
            CanonicalField::MaxSystemVoltage => {
                fields.max_system_voltage = numeric(field, raw, warnings)
            }
            CanonicalField::RSeries => fields.r_series = numeric(field, raw, warnings),
            CanonicalField::RShunt => fields.r_shunt = numeric(field, raw, warnings),
            CanonicalField::Weight => fields.weight_kg = numeric(field, raw, warnings),

            // ===== dimensions: PAN files carry meters, we store mm =====
            CanonicalField::Width => fields.width_mm = dimension_mm(field, raw, warnings),
            CanonicalField::Height => fields.height_mm = dimension_mm(field, raw, warnings),
            CanonicalField::Thickness => fields.thickness_mm = dimension_mm(field, raw, warnings),

            // ===== temperature coefficients: magnitude + recorded convention =====
            CanonicalField::TempCoeffPmax => {
                fields.temp_coeff_pmax = temp_coeff(field, raw, warnings)
            }
            CanonicalField::TempCoeffVoc => {
                fields.temp_coeff_voc = temp_coeff(field, raw, warnings)
            }
            CanonicalField::TempCoeffIsc => {
                fields.temp_coeff_isc = temp_coeff(field, raw, warnings)
            }

            // ===== counts =====
            CanonicalField::BypassDiodes => fields.bypass_diodes = integer(field, raw, warnings),
            CanonicalField::CellsInSeries => {
                fields.cells_in_series = integer(field, raw, warnings)
            }
            CanonicalField::CellsInParallel => {
                fields.cells_in_parallel = integer(field, raw, warnings)
            }

            // ===== bifaciality: percent form converts to a fraction =====
            CanonicalField::BifacialityFactor => match parse_numeric(raw) {
                Some((value, true)) => fields.bifaciality_factor = Some(value / 100.0),
                Some((value, false)) => fields.bifaciality_factor = Some(value),
                None => warnings.push(ParseWarning::warning(
                    field.as_str(),
                    Some(raw.to_string()),
                    "not numeric, field treated as absent",
                )),
            },
        }
    }

    /// Unit conversions that need more than one field.
    ///
    /// muVocSpec is specified in mV/°C; with Voc present it converts to
    /// %/°C as `value * 0.1 / voc`. Without Voc the raw magnitude is kept
    /// and noted, so nothing is silently misscaled.
    fn finalize_units(&self, fields: &mut MappedFields, warnings: &mut Vec<ParseWarning>) {
        if let Some(mu_voc) = fields.temp_coeff_voc {
            match fields.voc_stc {
                Some(voc) if voc > 0.0 => {
                    fields.temp_coeff_voc = Some(mu_voc * 0.1 / voc);
                }
                _ => warnings.push(ParseWarning::note(
                    CanonicalField::TempCoeffVoc.as_str(),
                    "kept in mV/°C: Voc unavailable for %/°C conversion",
                )),
            }
        }
    }

    /// Coerce raw block rows into candidate series. A row whose
    /// coordinates fail to parse is dropped with a warning; the series
    /// itself survives for the validator to judge.
    fn coerce_series(
        &self,
        tokens: &TokenizedFile,
        fields: &mut MappedFields,
        warnings: &mut Vec<ParseWarning>,
    ) {
        for block in &tokens.blocks {
            let mut points = Vec::with_capacity(block.rows.len());
            for (v_raw, i_raw) in &block.rows {
                match (parse_numeric(v_raw), parse_numeric(i_raw)) {
                    (Some((voltage, false)), Some((current, false))) => {
                        points.push(CurvePoint { voltage, current });
                    }
                    _ => warnings.push(ParseWarning::warning(
                        format!("series '{}'", block.label),
                        Some(format!("{} {}", v_raw, i_raw)),
                        "point row with non-numeric coordinates dropped",
                    )),
                }
            }
            fields.candidate_series.push(CandidateSeries {
                label: block.label.clone(),
                points,
            });
        }
    }
}

// ==========================================
// Coercion helpers
// ==========================================

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn numeric(
    field: CanonicalField,
    raw: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<f64> {
    match parse_numeric(raw) {
        Some((value, percent)) => Some(if percent { value / 100.0 } else { value }),
        None => {
            warnings.push(ParseWarning::warning(
                field.as_str(),
                Some(raw.to_string()),
                "not numeric, field treated as absent",
            ));
            None
        }
    }
}

/// Dimensions arrive in meters in the PAN dialect but some vendors put
/// millimeters in the same keys. Values under 10 are read as meters and
/// scaled to mm; anything larger is taken as mm already.
fn dimension_mm(
    field: CanonicalField,
    raw: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<f64> {
    numeric(field, raw, warnings).map(|v| if v.abs() < 10.0 { v * 1000.0 } else { v })
}

/// Temperature coefficients are stored as magnitudes; the vendor sign
/// convention (negative for power/voltage coefficients) is recorded as
/// a note when normalization actually changed the value.
fn temp_coeff(
    field: CanonicalField,
    raw: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<f64> {
    let value = numeric(field, raw, warnings)?;
    if value < 0.0 {
        warnings.push(ParseWarning::note(
            field.as_str(),
            "negative coefficient normalized to magnitude (negative convention assumed)",
        ));
    }
    Some(value.abs())
}

fn integer(
    field: CanonicalField,
    raw: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<i64> {
    match parse_numeric(raw) {
        Some((value, false)) if value.fract() == 0.0 => Some(value as i64),
        _ => {
            warnings.push(ParseWarning::warning(
                field.as_str(),
                Some(raw.to_string()),
                "not an integer, field treated as absent",
            ));
            None
        }
    }
}

/// Tolerant numeric parse.
///
/// Handles a trailing percent sign, a single decimal comma ("0,70"),
/// and comma/whitespace-separated value lists (first entry wins, the
/// PAN convention for multi-valued keys). Returns (value, was_percent).
pub fn parse_numeric(raw: &str) -> Option<(f64, bool)> {
    let mut s = raw.trim();
    let mut percent = false;
    if let Some(stripped) = s.strip_suffix('%') {
        s = stripped.trim_end();
        percent = true;
    }
    if s.is_empty() {
        return None;
    }

    let candidate: String = if s.contains(',')
        && !s.contains('.')
        && !s.contains(char::is_whitespace)
        && s.matches(',').count() == 1
    {
        // decimal comma, e.g. "0,70"
        s.replace(',', ".")
    } else {
        // value list, e.g. "49.9, 50.1": first entry wins
        s.split([',', ' ', '\t'])
            .find(|t| !t.is_empty())
            .unwrap_or("")
            .to_string()
    };

    match candidate.parse::<f64>() {
        Ok(v) if v.is_finite() => Some((v, percent)),
        _ => None,
    }
}
