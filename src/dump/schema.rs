// ABOUTME: Extracts and normalizes DDL for one catalog object
// ABOUTME: Beautifies single-line CREATE VIEW text and reorders KEY clauses

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::catalog::CatalogObject;
use crate::connection::Connection;
use crate::error::Result;

static RE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "(?i)(SELECT|FROM|LEFT JOIN|INNER JOIN|OUTER JOIN|RIGHT JOIN|JOIN|WHERE|GROUP BY|ORDER BY|LIMIT) ",
    )
    .expect("clause pattern")
});
static RE_BOOL_OP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[) ](on|and|or)[ (]").expect("boolean operator pattern"));
static RE_FUNC_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z_0-9]+?)\(").expect("function call pattern"));
static RE_DEFINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(" DEFINER=`.+?`@`.+?`").expect("definer pattern"));
static RE_KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^.+KEY .+$").expect("key line pattern"));

/// Normalizes `SHOW CREATE` output for one dump's database.
///
/// The schema-prefix pattern depends on the database name, so it is compiled
/// once here rather than per view.
pub struct SchemaExtractor {
    schema_prefix: Regex,
    sort_keys: bool,
}

impl SchemaExtractor {
    pub fn new(database: &str, sort_keys: bool) -> Self {
        let pattern = format!("(?i){}", regex::escape(&format!("`{}`.", database)));
        Self {
            schema_prefix: Regex::new(&pattern).expect("schema prefix pattern"),
            sort_keys,
        }
    }

    /// Fetch the `SHOW CREATE` text for one object and normalize it.
    ///
    /// Returns `None` (after logging) when the server hands back no create
    /// statement; the object then simply contributes no schema fragment and
    /// the dump continues.
    pub async fn extract<C: Connection + ?Sized>(
        &self,
        conn: &C,
        object: &CatalogObject,
    ) -> Result<Option<String>> {
        let sql = format!("SHOW CREATE TABLE `{}`", object.name);
        let rows = conn.query(&sql).await?;

        let create = rows.first().and_then(|row| {
            row.text("Create Table")
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    row.text("Create View")
                        .filter(|text| !text.is_empty())
                        .map(|text| self.beautify_create_view(text))
                })
        });

        let Some(create) = create else {
            tracing::warn!("missing create statement for {}", object.name);
            return Ok(None);
        };

        let mut ddl = format!("{};", create);
        if self.sort_keys {
            ddl = sort_key_clauses(&ddl);
        }
        ddl.push_str("\n\n");
        Ok(Some(ddl))
    }

    /// Break the engine's single-line `CREATE VIEW` text into readable
    /// clauses.
    ///
    /// Keywords go to their own uppercased line, column-list commas get a
    /// line break, lowercase function identifiers are uppercased, and
    /// engine-injected noise (`ALGORITHM=UNDEFINED`, `DEFINER=...`,
    /// `SQL SECURITY DEFINER`, the `` `db`. `` schema prefix) is stripped.
    pub fn beautify_create_view(&self, sql: &str) -> String {
        let step = RE_CLAUSE.replace_all(sql, |caps: &Captures| {
            format!("\n{}\n  ", caps[1].to_uppercase())
        });
        let step = step.replace("`,", "`,\n  ");
        let step = RE_BOOL_OP.replace_all(&step, |caps: &Captures| caps[0].to_uppercase());
        let step = RE_FUNC_CALL.replace_all(&step, |caps: &Captures| caps[0].to_uppercase());
        let step = step.replacen(" ALGORITHM=UNDEFINED", "", 1);
        let step = RE_DEFINER.replace(&step, "");
        let step = step.replacen(" SQL SECURITY DEFINER", "", 1);
        self.schema_prefix.replace_all(&step, "").into_owned()
    }
}

/// Reorder the `KEY` clauses of a `CREATE TABLE` body so primary and unique
/// keys come before plain indexes.
///
/// Plain `  KEY` lines are temporarily renamed to `  W_KEY` so a plain
/// lexicographic sort puts `PRIMARY KEY` and `UNIQUE KEY` first, then the
/// rename is undone. Trailing commas are repaired so only the last reordered
/// line lacks one, and the lines are spliced back into their original
/// positions.
pub fn sort_key_clauses(schema: &str) -> String {
    let keys: Vec<&str> = RE_KEY_LINE
        .find_iter(schema)
        .map(|found| found.as_str())
        .collect();
    if keys.is_empty() {
        return schema.to_string();
    }

    let mut sorted: Vec<String> = keys.iter().map(|k| k.replace("  KEY", "  W_KEY")).collect();
    sorted.sort();

    let last = sorted.len() - 1;
    let sorted: Vec<String> = sorted
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            let line = line.replace("  W_KEY", "  KEY");
            let line = line.strip_suffix(',').map(str::to_string).unwrap_or(line);
            if index < last {
                line + ","
            } else {
                line
            }
        })
        .collect();

    let mut replacements = sorted.into_iter();
    RE_KEY_LINE
        .replace_all(schema, |_: &Captures| {
            replacements.next().unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_primary_and_unique_keys_before_plain_keys() {
        let schema = "CREATE TABLE `t` (\n\
                      \x20 `id` int NOT NULL,\n\
                      \x20 `a` varchar(10) DEFAULT NULL,\n\
                      \x20 KEY `idx_a` (`a`),\n\
                      \x20 UNIQUE KEY `uq_a` (`a`),\n\
                      \x20 PRIMARY KEY (`id`)\n\
                      ) ENGINE=InnoDB;";
        let expected = "CREATE TABLE `t` (\n\
                        \x20 `id` int NOT NULL,\n\
                        \x20 `a` varchar(10) DEFAULT NULL,\n\
                        \x20 PRIMARY KEY (`id`),\n\
                        \x20 UNIQUE KEY `uq_a` (`a`),\n\
                        \x20 KEY `idx_a` (`a`)\n\
                        ) ENGINE=InnoDB;";
        assert_eq!(sort_key_clauses(schema), expected);
    }

    #[test]
    fn key_sorting_leaves_keyless_tables_alone() {
        let schema = "CREATE TABLE `t` (\n  `id` int NOT NULL\n) ENGINE=InnoDB;";
        assert_eq!(sort_key_clauses(schema), schema);
    }

    #[test]
    fn key_sorting_repairs_trailing_commas() {
        // The last clause in the body had no comma before sorting moved it up.
        let schema = "CREATE TABLE `t` (\n\
                      \x20 `a` int DEFAULT NULL,\n\
                      \x20 KEY `idx_a` (`a`),\n\
                      \x20 PRIMARY KEY (`a`)\n\
                      ) ENGINE=InnoDB;";
        let sorted = sort_key_clauses(schema);
        assert!(sorted.contains("  PRIMARY KEY (`a`),\n"));
        assert!(sorted.contains("  KEY `idx_a` (`a`)\n"));
        assert!(!sorted.contains("  KEY `idx_a` (`a`),"));
    }

    #[test]
    fn beautifies_single_line_create_view() {
        let input = "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`localhost` \
                     SQL SECURITY DEFINER VIEW `v_active` AS \
                     select `shop`.`users`.`id` AS `id`,`shop`.`users`.`name` AS `name`,\
                     count(0) AS `cnt` from `shop`.`users` where (`shop`.`users`.`active` = 1)";
        let expected = "CREATE VIEW `v_active` AS \
                        \nSELECT\n  `users`.`id` AS `id`,\n  `users`.`name` AS `name`,\
                        \n  COUNT(0) AS `cnt` \nFROM\n  `users` \nWHERE\n  (`users`.`active` = 1)";
        let extractor = SchemaExtractor::new("shop", false);
        assert_eq!(extractor.beautify_create_view(input), expected);
    }

    #[test]
    fn beautifier_uppercases_join_conditions() {
        let input = "CREATE VIEW `v` AS select `a`.`x` AS `x` from `t1` `a` \
                     join `t2` `b` on((`a`.`id` = `b`.`id`) and (`b`.`ok` = 1))";
        let output = SchemaExtractor::new("shop", false).beautify_create_view(input);
        assert!(output.contains("\nJOIN\n  "));
        assert!(output.contains(" ON("));
        assert!(output.contains(" AND ("));
    }
}
