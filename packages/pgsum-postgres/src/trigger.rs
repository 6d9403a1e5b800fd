//! Trigger bridge (C7), capture half.
//!
//! The installed trigger does the minimum possible: it appends an ordered,
//! already-text-cast change event to `pgsum.change_queue`. All hashing
//! happens later, in Rust (`consumer::ChangeConsumer`), sharing code with
//! bootstrap (§2 "Trigger bridge redesign"). This mirrors the *shape* of
//! the original's per-table code-generated trigger function (§9 "Per-table
//! code generation") without needing to replicate Postgres-internal hash
//! functions in Rust.

/// Quote a Postgres identifier, escaping embedded double quotes. Used for
/// schema/table/function names pulled from the catalog, which may contain
/// arbitrary characters once quoted.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Deterministic, collision-resistant-enough function name for a table's
/// capture trigger.
fn function_name(schema: &str, table: &str) -> String {
    quote_ident(&format!("pgsum_capture__{schema}__{table}"))
}

/// Build the `jsonb_build_object(col, ROW_ALIAS.col::text, ...)` argument
/// list for a set of columns.
fn jsonb_build_args(row_alias: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "'{}', {}.{}::text",
                c.replace('\'', "''"),
                row_alias,
                quote_ident(c)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQL to create (or replace) the per-table capture function and install
/// its trigger. Idempotent: safe to re-run, e.g. after a schema
/// reconfiguration.
pub fn install_trigger_sql(schema: &str, table: &str, columns: &[String]) -> String {
    let fn_name = function_name(schema, table);
    let qualified_table = format!("{}.{}", quote_ident(schema), quote_ident(table));
    let new_args = jsonb_build_args("NEW", columns);
    let old_args = jsonb_build_args("OLD", columns);

    format!(
        r#"
create or replace function pgsum.{fn_name}() returns trigger language plpgsql as $cap$
begin
  if TG_OP = 'INSERT' then
    insert into pgsum.change_queue(schema_name, table_name, op, new_row)
    values (TG_TABLE_SCHEMA, TG_TABLE_NAME, 'insert', jsonb_build_object({new_args}));
    return NEW;
  elsif TG_OP = 'UPDATE' then
    insert into pgsum.change_queue(schema_name, table_name, op, old_row, new_row)
    values (TG_TABLE_SCHEMA, TG_TABLE_NAME, 'update', jsonb_build_object({old_args}), jsonb_build_object({new_args}));
    return NEW;
  else
    insert into pgsum.change_queue(schema_name, table_name, op, old_row)
    values (TG_TABLE_SCHEMA, TG_TABLE_NAME, 'delete', jsonb_build_object({old_args}));
    return OLD;
  end if;
end;
$cap$;

drop trigger if exists pgsum_capture_tg on {qualified_table};
create trigger pgsum_capture_tg
  after insert or update or delete on {qualified_table}
  for each row execute function pgsum.{fn_name}();
"#
    )
}

/// SQL to remove a table's trigger and capture function (watch drop).
pub fn drop_trigger_sql(schema: &str, table: &str) -> String {
    let fn_name = function_name(schema, table);
    let qualified_table = format!("{}.{}", quote_ident(schema), quote_ident(table));
    format!(
        "drop trigger if exists pgsum_capture_tg on {qualified_table};\n\
         drop function if exists pgsum.{fn_name}();"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), "\"we\"\"ird\"");
    }

    #[test]
    fn install_trigger_sql_references_every_column() {
        let columns = vec!["id".to_string(), "v".to_string()];
        let sql = install_trigger_sql("public", "t", &columns);
        assert!(sql.contains("'id'"));
        assert!(sql.contains("'v'"));
        assert!(sql.contains("NEW.\"id\"::text"));
        assert!(sql.contains("OLD.\"v\"::text"));
    }

    #[test]
    fn install_trigger_sql_is_idempotent_shape() {
        let columns = vec!["id".to_string()];
        let sql = install_trigger_sql("public", "t", &columns);
        assert!(sql.contains("create or replace function"));
        assert!(sql.contains("drop trigger if exists pgsum_capture_tg"));
    }

    #[test]
    fn function_name_is_qualified_and_quoted() {
        let name = function_name("public", "orders");
        assert!(name.starts_with('"'));
        assert!(name.contains("public"));
        assert!(name.contains("orders"));
    }
}
