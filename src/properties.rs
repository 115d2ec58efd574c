//! Error-property descriptors and the study property registry
//!
//! A property descriptor names one (category, field) error column plus the
//! presentation metadata the reporting layer needs: title, axis labels and
//! the file tag used in output names. Descriptors carry no behavior.

use crate::table::{ColumnKey, Table, CAT_CASE};

/// Report purpose, the middle part of every output file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Timeplot,
    Convergenceplot,
    BestConvergenceplot,
    Table,
    RankTable,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Timeplot => "timeplot",
            Purpose::Convergenceplot => "convergenceplot",
            Purpose::BestConvergenceplot => "best-convergenceplot",
            Purpose::Table => "table",
            Purpose::RankTable => "nsmallest",
        }
    }
}

/// Descriptor of one error column with its presentation metadata
#[derive(Debug, Clone)]
pub struct Prop {
    pub column: ColumnKey,
    pub study: String,
    pub title: String,
    pub label: String,
    pub conv_label: Option<String>,
    /// File tag identifying this property in output names
    pub tag: String,
}

impl Prop {
    /// Output file name: study + tag + purpose, optionally a refinement
    /// suffix and a 1-based, gap-free batch index `{i}-{n}`.
    pub fn file_name(
        &self,
        purpose: Purpose,
        refinement: Option<&str>,
        batch: Option<(usize, usize)>,
    ) -> String {
        let mut name = format!("{}_{}_{}", self.study, self.tag, purpose.as_str());
        if let Some(suffix) = refinement {
            name.push('_');
            name.push_str(suffix);
        }
        if let Some((index, total)) = batch {
            name.push_str(&format!("_{}-{}", index, total));
        }
        name.push_str(".csv");
        name
    }
}

fn prop(
    study: &str,
    template: &str,
    mesh: Option<&str>,
    field: &str,
    title: &str,
    tag: &str,
    label: &str,
    conv_label: Option<&str>,
) -> Prop {
    let title = [template, mesh.unwrap_or(""), title]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    Prop {
        column: ColumnKey::case(field),
        study: study.to_string(),
        title,
        label: label.to_string(),
        conv_label: conv_label.map(str::to_string),
        tag: tag.to_string(),
    }
}

/// The error properties a study database may carry.
pub fn error_properties(template: &str, study: &str, mesh: Option<&str>) -> Vec<Prop> {
    vec![
        prop(
            study,
            template,
            mesh,
            "E_NARROW_MEAN_GRAD_PSI",
            "signed distance error",
            "EMeanGradPsi-narrowBand",
            r"$ E_{\nabla\psi}(t) $",
            Some(r"$ \max_{t \in T_h} E_{\nabla\psi}(t) $"),
        ),
        prop(
            study,
            template,
            mesh,
            "E_MAX_GRAD_PSI",
            "max signed distance error",
            "EMaxGradPsi",
            r"$ E_{\nabla\psi}(t) $",
            Some(r"$ \max_{t \in T_h} E_{\nabla\psi}(t) $"),
        ),
        prop(
            study,
            template,
            mesh,
            "E_GEOM_ALPHA",
            "geometrical error",
            "Eg",
            r"$ E_{g} $",
            None,
        ),
        prop(
            study,
            template,
            mesh,
            "E_VOL_ALPHA_REL",
            "volume conservation error",
            "Ev",
            r"$ E_{v}(t) $",
            Some(r"$ \max_{t \in T_h} E_v(t) $"),
        ),
        prop(
            study,
            template,
            mesh,
            "E_VOL_ALPHA_REL_TV",
            "TV of volume conservation error",
            "EvTV",
            r"$ TV(E_v(t^n)) $",
            Some(r"$ TV(E_v(t^{end})) $"),
        ),
        prop(
            study,
            template,
            mesh,
            "E_TV",
            "total variation error",
            "Etv",
            r"$ E_{TV}(t) $",
            Some(r"$ |E_{TV}(t^{end})| $"),
        ),
        prop(
            study,
            template,
            mesh,
            "E_TV_REL",
            "relative total variation error",
            "Etv-rel",
            r"$ E_{TV}(t) $",
            Some(r"$ |E_{TV}(t^{end})| $"),
        ),
        prop(
            study,
            template,
            mesh,
            "max_error_velocity",
            "maximal velocity",
            "E-umax",
            r"$ \max(|\mathbf{v(t)}|) $ in m/s",
            Some(r"$ \max(|\mathbf{v(t^{end})}|) $ in m/s"),
        ),
    ]
}

/// Properties reported over time only, never ranked or convergence-rated.
pub fn time_properties(template: &str, study: &str, mesh: Option<&str>) -> Vec<Prop> {
    vec![prop(
        study,
        template,
        mesh,
        "MAX_CFL",
        "max(CFL)",
        "CFLmax",
        r"$ CFL $",
        None,
    )]
}

/// Whether a column holds an error metric the estimator should rate.
pub fn is_error_column(key: &ColumnKey) -> bool {
    key.category == CAT_CASE
        && (key.field.starts_with("E_") || key.field.starts_with("max_error"))
}

/// Restrict a property list to the columns actually present in `table`.
pub fn present_properties(props: Vec<Prop>, table: &Table) -> Vec<Prop> {
    props
        .into_iter()
        .filter(|p| table.has_column(&p.column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::parse_study_csv;

    #[test]
    fn test_file_name_plain() {
        let props = error_properties("templateX", "study_templateX_0001", None);
        let ev = props.iter().find(|p| p.tag == "Ev").unwrap();
        assert_eq!(
            ev.file_name(Purpose::RankTable, None, None),
            "study_templateX_0001_Ev_nsmallest.csv"
        );
    }

    #[test]
    fn test_file_name_with_refinement_and_batch() {
        let props = error_properties("t", "s", None);
        let ev = props.iter().find(|p| p.tag == "Ev").unwrap();
        assert_eq!(
            ev.file_name(Purpose::Timeplot, Some("resolution-64"), Some((2, 3))),
            "s_Ev_timeplot_resolution-64_2-3.csv"
        );
    }

    #[test]
    fn test_title_includes_template_and_mesh() {
        let props = error_properties("templateX", "s", Some("hex"));
        assert!(props[0].title.starts_with("templateX hex"));
        let bare = error_properties("templateX", "s", None);
        assert!(bare[0].title.starts_with("templateX signed"));
    }

    #[test]
    fn test_is_error_column() {
        assert!(is_error_column(&ColumnKey::case("E_TV")));
        assert!(is_error_column(&ColumnKey::case("max_error_velocity")));
        assert!(!is_error_column(&ColumnKey::case("TIME")));
        assert!(!is_error_column(&ColumnKey::case("O(E_TV)")));
        assert!(!is_error_column(&ColumnKey::study_parameter("E_TV")));
    }

    #[test]
    fn test_present_properties_filters_missing_columns() {
        let table = parse_study_csv(
            "\
database,case,case
CASE,TIME,E_TV
caseA,0.0,0.1
",
        )
        .unwrap();
        let present = present_properties(error_properties("t", "s", None), &table);
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].column, ColumnKey::case("E_TV"));
    }
}
