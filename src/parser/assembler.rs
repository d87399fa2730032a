// ==========================================
// PV PAN Tool - Record assembler
// ==========================================
// Combines mapped fields, accepted curve series and file metadata into
// one immutable ModuleRecord. Derived columns are computed from present
// values only; absent inputs leave them absent. Power-voltage series
// are never synthesized here: provided series are stored verbatim and
// any power view is derived on read by consumers.
// ==========================================

use crate::domain::module::{
    CurveSeries, ElectricalParameters, FileMetadata, ModuleRecord, PhysicalParameters,
};
use crate::domain::types::{CellType, ModuleType};
use crate::parser::field_mapper::MappedFields;

pub struct RecordAssembler;

impl RecordAssembler {
    /// Build the final record.
    ///
    /// # Arguments
    /// - fields: validated canonical fields
    /// - curves: accepted curve series
    /// - metadata: source file identity
    /// - manufacturer_hint / model_hint: path-derived fallbacks used when
    ///   the file itself does not name them
    pub fn assemble(
        &self,
        fields: MappedFields,
        curves: Vec<CurveSeries>,
        metadata: FileMetadata,
        manufacturer_hint: &str,
        model_hint: &str,
    ) -> ModuleRecord {
        let manufacturer = fields
            .manufacturer
            .clone()
            .unwrap_or_else(|| manufacturer_hint.to_string());
        let model = fields.model.clone().unwrap_or_else(|| model_hint.to_string());

        let hash8: String = metadata.file_hash.chars().take(8).collect();
        let unique_id = format!("{}_{}_{}", manufacturer, model, hash8);

        let electrical = ElectricalParameters {
            pmax_stc: fields.pmax_stc,
            vmp_stc: fields.vmp_stc,
            imp_stc: fields.imp_stc,
            voc_stc: fields.voc_stc,
            isc_stc: fields.isc_stc,
            temp_coeff_pmax: fields.temp_coeff_pmax,
            temp_coeff_voc: fields.temp_coeff_voc,
            temp_coeff_isc: fields.temp_coeff_isc,
            g_ref: fields.g_ref,
            t_ref: fields.t_ref,
            noct: fields.noct,
            bypass_diodes: fields.bypass_diodes,
            max_system_voltage: fields.max_system_voltage,
            r_series: fields.r_series,
            r_shunt: fields.r_shunt,
            bifaciality_factor: fields.bifaciality_factor,
        };

        let total_cells = match (fields.cells_in_series, fields.cells_in_parallel) {
            (Some(s), Some(p)) => Some(s * p),
            _ => None,
        };
        let physical = PhysicalParameters {
            width_mm: fields.width_mm,
            height_mm: fields.height_mm,
            thickness_mm: fields.thickness_mm,
            weight_kg: fields.weight_kg,
            cells_in_series: fields.cells_in_series,
            cells_in_parallel: fields.cells_in_parallel,
            total_cells,
        };

        let area_m2 = physical.area_m2();
        let (efficiency_stc, power_density) = match (electrical.pmax_stc, area_m2) {
            (Some(pmax), Some(area)) if area > 0.0 => (
                Some((pmax / (area * 1000.0)) * 100.0),
                Some(pmax / area),
            ),
            _ => (None, None),
        };

        let cell_type = fields
            .technology
            .as_deref()
            .map(CellType::from_technology)
            .unwrap_or(CellType::Unknown);

        // A positive bifaciality factor marks the module bifacial.
        let module_type = match electrical.bifaciality_factor {
            Some(f) if f > 0.0 => ModuleType::Bifacial,
            _ => ModuleType::Standard,
        };

        ModuleRecord {
            unique_id,
            manufacturer,
            model,
            electrical,
            physical,
            cell_type,
            module_type,
            technology: fields.technology,
            area_m2,
            efficiency_stc,
            power_density,
            curves,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metadata() -> FileMetadata {
        FileMetadata {
            file_path: "/data/Jinko/Tiger/spec.pan".into(),
            file_name: "spec.pan".into(),
            file_size: 128,
            file_hash: "ba7816bf8f01cfea414140de5dae2223".into(),
            last_modified: Utc::now(),
            parsed_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_id_shape() {
        let fields = MappedFields {
            manufacturer: Some("Jinko".into()),
            model: Some("Tiger".into()),
            ..Default::default()
        };
        let record =
            RecordAssembler.assemble(fields, Vec::new(), metadata(), "FolderMan", "FolderModel");
        assert_eq!(record.unique_id, "Jinko_Tiger_ba7816bf");
    }

    #[test]
    fn test_path_hints_used_when_file_is_silent() {
        let record = RecordAssembler.assemble(
            MappedFields::default(),
            Vec::new(),
            metadata(),
            "Jinko",
            "Tiger",
        );
        assert_eq!(record.manufacturer, "Jinko");
        assert_eq!(record.model, "Tiger");
    }

    #[test]
    fn test_derived_columns_need_all_inputs() {
        let fields = MappedFields {
            pmax_stc: Some(550.0),
            width_mm: Some(1134.0),
            height_mm: Some(2278.0),
            ..Default::default()
        };
        let record = RecordAssembler.assemble(fields, Vec::new(), metadata(), "M", "X");
        let area = record.area_m2.unwrap();
        assert!((area - 2.583252).abs() < 1e-6);
        let eff = record.efficiency_stc.unwrap();
        assert!((eff - 21.291).abs() < 0.01);
        assert!(record.power_density.is_some());

        // missing a dimension leaves every derived column absent
        let fields = MappedFields {
            pmax_stc: Some(550.0),
            width_mm: Some(1134.0),
            ..Default::default()
        };
        let record = RecordAssembler.assemble(fields, Vec::new(), metadata(), "M", "X");
        assert_eq!(record.area_m2, None);
        assert_eq!(record.efficiency_stc, None);
        assert_eq!(record.power_density, None);
    }

    #[test]
    fn test_bifacial_promotion() {
        let fields = MappedFields {
            bifaciality_factor: Some(0.7),
            ..Default::default()
        };
        let record = RecordAssembler.assemble(fields, Vec::new(), metadata(), "M", "X");
        assert_eq!(record.module_type, ModuleType::Bifacial);

        let record =
            RecordAssembler.assemble(MappedFields::default(), Vec::new(), metadata(), "M", "X");
        assert_eq!(record.module_type, ModuleType::Standard);
        assert_eq!(record.electrical.bifaciality_factor, None);
    }
}
