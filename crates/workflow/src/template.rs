use model::catalog::CatalogTableDescriptor;
use model::export::ExportHandle;

pub const TABLE_NAME_TOKEN: &str = "table_name";
pub const DATABASE_NAME_TOKEN: &str = "db_name";
pub const EXPORT_ID_TOKEN: &str = "ddb-export-id";
pub const DATA_LOCATION_TOKEN: &str = "s3Location";

/// Placeholder tokens and the literal text replacing them.
///
/// Rendering replaces every occurrence in a single left to right pass, so a
/// substituted value is never scanned for further tokens and the order in
/// which tokens were added does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    entries: Vec<(String, String)>,
}

impl Substitutions {
    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        let token: String = token.into();
        if !token.is_empty() {
            self.entries.retain(|(existing, _)| *existing != token);
            self.entries.push((token, value.into()));
        }
        self
    }

    /// Tokens understood by the export query templates.
    pub fn for_export(table: &CatalogTableDescriptor, export: &ExportHandle) -> Self {
        Substitutions::default()
            .with(TABLE_NAME_TOKEN, &table.table_name)
            .with(DATABASE_NAME_TOKEN, &table.database_name)
            .with(EXPORT_ID_TOKEN, &export.export_id)
            .with(DATA_LOCATION_TOKEN, &table.data_location)
    }

    pub fn render(&self, template: &str) -> String {
        let mut rendered: String = String::with_capacity(template.len());
        let mut rest: &str = template;

        while let Some((index, token, value)) = self.next_token(rest) {
            rendered.push_str(&rest[..index]);
            rendered.push_str(value);
            rest = &rest[index + token.len()..];
        }
        rendered.push_str(rest);

        rendered
    }

    // Earliest token in `text`, preferring the longest when several start together
    fn next_token<'a>(&'a self, text: &str) -> Option<(usize, &'a str, &'a str)> {
        self.entries
            .iter()
            .filter_map(|(token, value)| {
                text.find(token.as_str())
                    .map(|index| (index, token.as_str(), value.as_str()))
            })
            .min_by(|(left_index, left_token, _), (right_index, right_token, _)| {
                left_index
                    .cmp(right_index)
                    .then(right_token.len().cmp(&left_token.len()))
            })
    }
}
