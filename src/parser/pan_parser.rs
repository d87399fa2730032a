// ==========================================
// PV PAN Tool - Per-file parse pipeline
// ==========================================
// decode -> tokenize -> map -> validate -> assemble
// A pipeline run is a pure function of the file bytes plus the
// immutable configuration, so files can be parsed concurrently with
// no shared mutable state. Only structural failures abort a file.
// ==========================================

use crate::config::IngestConfig;
use crate::domain::module::{FileMetadata, ParseOutcome};
use crate::parser::assembler::RecordAssembler;
use crate::parser::error::{ParseError, ParseResult};
use crate::parser::field_mapper::FieldMapper;
use crate::parser::tokenizer::Tokenizer;
use crate::parser::validator::Validator;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

pub struct PanParser {
    tokenizer: Tokenizer,
    mapper: FieldMapper,
    validator: Validator,
    assembler: RecordAssembler,
}

impl PanParser {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            tokenizer: Tokenizer::new(config),
            mapper: FieldMapper::new(config.key_table()),
            validator: Validator::new(config),
            assembler: RecordAssembler,
        }
    }

    /// Parse a file on disk.
    ///
    /// # Arguments
    /// - path: the .pan file
    /// - base_dir: scan root used to derive manufacturer/model fallbacks
    ///   from the folder structure (Manufacturer/Model/file.pan)
    pub fn parse_file(&self, path: &Path, base_dir: Option<&Path>) -> ParseResult<ParseOutcome> {
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path).map_err(|e| ParseError::read_error(path, &e))?;
        let modified_at: DateTime<Utc> = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(Into::into)
            .map_err(|e| ParseError::read_error(path, &e))?;

        self.parse_bytes(path, modified_at, &bytes, base_dir)
    }

    /// Parse already-read bytes. This is the pure pipeline the workers
    /// run; it performs no I/O.
    pub fn parse_bytes(
        &self,
        path: &Path,
        modified_at: DateTime<Utc>,
        bytes: &[u8],
        base_dir: Option<&Path>,
    ) -> ParseResult<ParseOutcome> {
        // Stage 1: decode + tokenize
        let text = self.tokenizer.decode(path, bytes)?;
        let tokens = self.tokenizer.tokenize(&text);
        if tokens.is_empty() {
            return Err(ParseError::EmptyStructure(path.display().to_string()));
        }
        debug!(
            path = %path.display(),
            pairs = tokens.pairs.len(),
            blocks = tokens.blocks.len(),
            notes = tokens.notes.len(),
            "tokenized"
        );

        // Stage 2: field mapping
        let (mut fields, mapping_warnings) = self.mapper.map(&tokens);

        // Stage 3: validation
        let field_warnings = self.validator.validate_fields(&mut fields);
        let candidates = std::mem::take(&mut fields.candidate_series);
        let (curves, series_warnings) = self.validator.validate_series(candidates);

        // Stage 4: assembly
        let metadata = FileMetadata {
            file_path: path.display().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_size: bytes.len() as u64,
            file_hash: crate::domain::registry::sha256_hex(bytes),
            last_modified: modified_at,
            parsed_at: Utc::now(),
        };

        let (manufacturer_hint, model_hint) = hints_from_path(path, base_dir);
        let record = self
            .assembler
            .assemble(fields, curves, metadata, &manufacturer_hint, &model_hint);

        // Warnings in pipeline order: tokenizer notes, mapping, fields, series
        let mut warnings = tokens.notes;
        warnings.extend(mapping_warnings);
        warnings.extend(field_warnings);
        warnings.extend(series_warnings);

        debug!(
            unique_id = %record.unique_id,
            warnings = warnings.len(),
            curves = record.curves.len(),
            "assembled"
        );

        Ok(ParseOutcome { record, warnings })
    }
}

/// Derive (manufacturer, model) fallbacks from the path layout
/// `base/Manufacturer/Model/file.pan`. With a shallower layout the file
/// stem stands in for the model; with no usable structure both fall
/// back to "Unknown" / stem.
fn hints_from_path(path: &Path, base_dir: Option<&Path>) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let Some(base) = base_dir else {
        return ("Unknown".to_string(), stem);
    };
    let Ok(relative) = path.strip_prefix(base) else {
        return ("Unknown".to_string(), stem);
    };

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    match parts.len() {
        n if n >= 3 => (parts[0].clone(), parts[1].clone()),
        2 => (parts[0].clone(), stem),
        _ => ("Unknown".to_string(), stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::WarningSeverity;

    const SAMPLE: &str = "\
Manufacturer = Jinko Solar
Model = Tiger Neo 72HL4
PNom = 550
Voc = 49.9
Isc = 13.9
Vmp = 41.96
Imp = 13.11
Technol = mtSiMono
Width = 1.134
Height = 2.278
Bifaciality = 70%
IVCurve_STC
0.0, 13.9
10.0, 13.8
20.0, 13.5
30.0, 12.9
41.96, 13.11
End of IVCurve
";

    fn parser() -> PanParser {
        PanParser::new(&IngestConfig::default())
    }

    fn parse(text: &str) -> ParseResult<ParseOutcome> {
        parser().parse_bytes(Path::new("Jinko/Tiger/spec.pan"), Utc::now(), text.as_bytes(), None)
    }

    #[test]
    fn test_full_pipeline_happy_path() {
        let outcome = parse(SAMPLE).unwrap();
        let record = &outcome.record;
        assert_eq!(record.manufacturer, "Jinko Solar");
        assert_eq!(record.electrical.pmax_stc, Some(550.0));
        assert_eq!(record.electrical.bifaciality_factor, Some(0.70));
        assert_eq!(record.curves.len(), 1);
        assert_eq!(record.curves[0].points.len(), 5);
        assert!(record.efficiency_stc.is_some());
        assert!(!outcome.has_warnings());
    }

    #[test]
    fn test_three_point_block_drops_series_keeps_record() {
        let text = "PNom = 550\nBifaciality = 70%\nIVCurve_STC\n0,10\n1,9\n2,8\n";
        let outcome = parse(text).unwrap();
        assert!(outcome.record.curves.is_empty());
        assert_eq!(outcome.record.electrical.pmax_stc, Some(550.0));
        assert_eq!(outcome.record.electrical.bifaciality_factor, Some(0.70));
        let hard: Vec<_> = outcome
            .warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Warning)
            .collect();
        assert_eq!(hard.len(), 1);
    }

    #[test]
    fn test_empty_file_is_structural_error() {
        assert!(matches!(parse(""), Err(ParseError::EmptyStructure(_))));
        assert!(matches!(parse("\n\n???\n"), Err(ParseError::EmptyStructure(_))));
    }

    #[test]
    fn test_hints_from_path_layouts() {
        let base = Path::new("/data");
        assert_eq!(
            hints_from_path(Path::new("/data/Jinko/Tiger/spec.pan"), Some(base)),
            ("Jinko".to_string(), "Tiger".to_string())
        );
        assert_eq!(
            hints_from_path(Path::new("/data/Jinko/neo.pan"), Some(base)),
            ("Jinko".to_string(), "neo".to_string())
        );
        assert_eq!(
            hints_from_path(Path::new("/data/loose.pan"), Some(base)),
            ("Unknown".to_string(), "loose".to_string())
        );
        assert_eq!(
            hints_from_path(Path::new("/elsewhere/x.pan"), Some(base)),
            ("Unknown".to_string(), "x".to_string())
        );
    }
}
