use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_simple_select() {
    let structure = QueryStructure::from_sql("SELECT id, name FROM students WHERE marks > 80");
    assert_eq!(
        structure,
        QueryStructure {
            tables: vec!["students".into()],
            columns: vec!["id".into(), "name".into()],
            has_joins: false,
            has_aggregates: false,
            has_subquery: false,
        }
    );
}

#[test]
fn test_join_and_aggregate() {
    let sql = "select c.name, count(o.id)\nfrom customers c\njoin orders o on o.customer_id = c.id\ngroup by c.name";
    let structure = QueryStructure::from_sql(sql);

    assert_eq!(structure.tables, vec!["customers", "orders"]);
    assert_eq!(structure.columns, vec!["c.name", "count(o.id)"]);
    assert!(structure.has_joins);
    assert!(structure.has_aggregates);
    assert!(!structure.has_subquery);
}

#[test]
fn test_tables_are_deduplicated() {
    let sql = "SELECT a.x FROM items a JOIN items b ON a.id = b.parent_id";
    assert_eq!(extract_tables(sql), vec!["items"]);
}

#[test]
fn test_subquery() {
    let sql = "SELECT name FROM students WHERE id IN ( select student_id FROM enrollments)";
    let structure = QueryStructure::from_sql(sql);
    assert!(structure.has_subquery);
    assert_eq!(structure.tables, vec!["students", "enrollments"]);
}

#[test]
fn test_no_select_list() {
    assert!(extract_columns("VALUES (1), (2)").is_empty());
    assert_eq!(QueryStructure::from_sql(""), QueryStructure::default());
}

#[test]
fn test_wildcard_column() {
    assert_eq!(extract_columns("SELECT * FROM t"), vec!["*"]);
}
