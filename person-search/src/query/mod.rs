//! Translation of user search parameters into structured queries.
//!
//! The builders only produce [`QueryClause`] values; rendering them for a backend is the
//! provider's job. [`SearchGateway`] attaches the aggregation plan and submits.

mod gateway;

use person_search_shared::{Aggregation, HistogramInterval, QueryClause, WeightedField};

pub use gateway::SearchGateway;

/// Derived free-text field matched by the simple search.
pub const FULLTEXT_FIELD: &str = "fulltext";
pub const NAME_FIELD: &str = "name";
/// Weight of the name field relative to the free-text field.
pub const NAME_BOOST: f32 = 3.0;

pub const NAME_AUTOCOMPLETE_FIELD: &str = "name.autocomplete";
pub const COUNTRY_AUTOCOMPLETE_FIELD: &str = "address.country.autocomplete";
pub const CITY_AUTOCOMPLETE_FIELD: &str = "address.city.autocomplete";

const COUNTRY_FIELD: &str = "address.country";
const DATE_OF_BIRTH_FIELD: &str = "dateOfBirth";
const CHILDREN_FIELD: &str = "children";

/// Days per decade bucket of the per-country histogram.
const DECADE_DAYS: u32 = 3652;
const HISTOGRAM_MIN_YEAR: &str = "1940";
const HISTOGRAM_MAX_YEAR: &str = "2009";
const YEAR_FORMAT: &str = "yyyy";

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Build the default free-text query.
///
/// Blank or absent text matches everything. Otherwise the text is matched against the
/// full-text field and the name field, any of them matching, with name matches weighted
/// higher.
pub fn build_simple_query(text: Option<&str>) -> QueryClause {
    match non_blank(text) {
        None => QueryClause::MatchAll,
        Some(text) => QueryClause::MultiMatch {
            query: text.to_string(),
            fields: vec![
                WeightedField::new(FULLTEXT_FIELD),
                WeightedField::boosted(NAME_FIELD, NAME_BOOST),
            ],
        },
    }
}

/// Build the field-specific prefix query.
///
/// Every non-blank parameter contributes one required clause, in name, country, city
/// order. With no parameter set the query matches everything.
pub fn build_advanced_query(
    name: Option<&str>,
    country: Option<&str>,
    city: Option<&str>,
) -> QueryClause {
    let must: Vec<QueryClause> = [
        (NAME_AUTOCOMPLETE_FIELD, name),
        (COUNTRY_AUTOCOMPLETE_FIELD, country),
        (CITY_AUTOCOMPLETE_FIELD, city),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        non_blank(value).map(|value| QueryClause::Match {
            field: field.to_string(),
            query: value.to_string(),
        })
    })
    .collect();

    if must.is_empty() {
        QueryClause::MatchAll
    } else {
        QueryClause::Bool { must }
    }
}

/// The aggregation plan attached to every search.
///
/// - `by_country`: terms on the country, each bucket split into decades of birth
///   (`by_year`) carrying the average number of children (`avg_children`)
/// - `by_year`: yearly histogram of birth dates over the whole result set
pub fn default_aggregations() -> Vec<Aggregation> {
    let bounds = Some((
        HISTOGRAM_MIN_YEAR.to_string(),
        HISTOGRAM_MAX_YEAR.to_string(),
    ));

    vec![
        Aggregation::Terms {
            name: "by_country".to_string(),
            field: COUNTRY_FIELD.to_string(),
            aggregations: vec![Aggregation::DateHistogram {
                name: "by_year".to_string(),
                field: DATE_OF_BIRTH_FIELD.to_string(),
                interval: HistogramInterval::Days(DECADE_DAYS),
                min_doc_count: 0,
                extended_bounds: bounds.clone(),
                format: Some(YEAR_FORMAT.to_string()),
                aggregations: vec![Aggregation::Avg {
                    name: "avg_children".to_string(),
                    field: CHILDREN_FIELD.to_string(),
                }],
            }],
        },
        Aggregation::DateHistogram {
            name: "by_year".to_string(),
            field: DATE_OF_BIRTH_FIELD.to_string(),
            interval: HistogramInterval::Year,
            min_doc_count: 0,
            extended_bounds: bounds,
            format: Some(YEAR_FORMAT.to_string()),
            aggregations: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use person_search_shared::SearchRequest;

    #[test]
    fn test_simple_query_blank_is_match_all() {
        assert_eq!(build_simple_query(None), QueryClause::MatchAll);
        assert_eq!(build_simple_query(Some("")), QueryClause::MatchAll);
        assert_eq!(build_simple_query(Some("   ")), QueryClause::MatchAll);
    }

    #[test]
    fn test_simple_query_boosts_name() {
        let QueryClause::MultiMatch { query, fields } = build_simple_query(Some("joe")) else {
            panic!("expected a multi-field match");
        };

        assert_eq!(query, "joe");
        let name = fields.iter().find(|f| f.name == NAME_FIELD).unwrap();
        let fulltext = fields.iter().find(|f| f.name == FULLTEXT_FIELD).unwrap();
        assert!(name.boost > fulltext.boost);
        assert_eq!(name.boost, 3.0);
    }

    #[test]
    fn test_advanced_query_single_clause() {
        assert_eq!(
            build_advanced_query(Some(""), Some("France"), None),
            QueryClause::Bool {
                must: vec![QueryClause::Match {
                    field: COUNTRY_AUTOCOMPLETE_FIELD.to_string(),
                    query: "France".to_string(),
                }]
            }
        );
    }

    #[test]
    fn test_advanced_query_keeps_parameter_order() {
        let QueryClause::Bool { must } =
            build_advanced_query(Some("joe"), Some("France"), Some("Paris"))
        else {
            panic!("expected a conjunction");
        };

        let fields: Vec<&str> = must
            .iter()
            .map(|clause| match clause {
                QueryClause::Match { field, .. } => field.as_str(),
                other => panic!("unexpected clause {:?}", other),
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                NAME_AUTOCOMPLETE_FIELD,
                COUNTRY_AUTOCOMPLETE_FIELD,
                CITY_AUTOCOMPLETE_FIELD
            ]
        );
    }

    #[test]
    fn test_advanced_query_all_blank_is_match_all() {
        assert_eq!(build_advanced_query(None, Some(" "), None), QueryClause::MatchAll);
    }

    #[test]
    fn test_default_aggregations_are_valid() {
        let plan = default_aggregations();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].name(), "by_country");
        assert_eq!(plan[0].sub_aggregations()[0].name(), "by_year");
        assert_eq!(
            plan[0].sub_aggregations()[0].sub_aggregations()[0].name(),
            "avg_children"
        );
        assert_eq!(plan[1].name(), "by_year");

        let request = SearchRequest::new(QueryClause::MatchAll).with_aggregations(plan);
        assert!(request.validate().is_ok());
    }
}
