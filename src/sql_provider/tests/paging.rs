use super::*;
use crate::sql_provider::{DataProvider, RowNumberWindow};

/// The rows kept by skip/take over an ordered sequence.
fn expected_rows(skip: i64, take: Option<i64>, total: i64) -> Vec<i64> {
    (1..=total)
        .skip(skip as usize)
        .take(take.map_or(usize::MAX, |t| t as usize))
        .collect()
}

#[test]
fn test_window_matches_skip_take() {
    for skip in 0..6 {
        for take in [None, Some(0), Some(1), Some(2), Some(5), Some(20)] {
            let window = RowNumberWindow::from_paging(skip, take).unwrap();
            let kept: Vec<i64> = (1..=12).filter(|&rn| window.contains(rn)).collect();
            assert_eq!(kept, expected_rows(skip, take, 12), "skip {} take {:?}", skip, take);
        }
    }
}

#[test]
fn test_rendered_window_condition() {
    for (skip, take) in [(0, Some(3)), (4, Some(1)), (7, None), (10, Some(10))] {
        let mut tree = SqlTree::new();
        let (query, _) = select_first_names(&mut tree);
        let skip_node = tree.value(skip);
        let take_node = take.map(|t| tree.value(t));
        let q = tree.query_mut(query).unwrap();
        q.select.skip = Some(skip_node);
        q.select.take = take_node;

        let sql = DataProvider::sql_server("2005").build_sql(&mut tree, query).unwrap().sql;
        let condition = RowNumberWindow::from_paging(skip, take).unwrap().condition("[t3].[rn1]");
        assert!(sql.ends_with(&format!("WHERE\n\t{}", condition)), "{}", sql);
        assert!(!sql.contains("TOP"), "{}", sql);
    }
}

/// Ordered skip/take over `(FirstName, LastName)` rows, keyed on the last name.
fn reference_page<'r>(
    rows: &[(&'r str, &'r str)],
    descending: bool,
    skip: i64,
    take: Option<i64>,
) -> Vec<&'r str> {
    let mut ordered = rows.to_vec();
    ordered.sort_by_key(|row| row.1);
    if descending {
        ordered.reverse();
    }
    ordered
        .into_iter()
        .skip(skip as usize)
        .take(take.map_or(usize::MAX, |t| t as usize))
        .map(|row| row.0)
        .collect()
}

#[test]
fn test_windowed_form_matches_ordered_skip_take() {
    let rows = [
        ("Ann", "Lee"),
        ("Bob", "Ng"),
        ("Cid", "Ali"),
        ("Dee", "Kim"),
        ("Eve", "Bay"),
        ("Fay", "Ort"),
        ("Gus", "Cho"),
    ];

    for descending in [false, true] {
        for (skip, take) in [(0, Some(3)), (2, Some(2)), (3, None), (6, Some(4)), (9, Some(1))] {
            let mut tree = SqlTree::new();
            let (query, table) = select_first_names(&mut tree);
            let last_name = tree.table_field(table, "LastName").unwrap();
            tree.order_by_add(query, last_name, descending).unwrap();
            let skip_node = tree.value(skip);
            let take_node = take.map(|t| tree.value(t));
            let q = tree.query_mut(query).unwrap();
            q.select.skip = Some(skip_node);
            q.select.take = take_node;

            let sql = DataProvider::sql_server("2005").build_sql(&mut tree, query).unwrap().sql;

            // Rows are numbered by the projected order key, in the query's direction.
            assert!(sql.contains("[t1].[LastName] as [oby1]"), "{}", sql);
            let key = if descending { "[t2].[oby1] DESC" } else { "[t2].[oby1]" };
            let over = format!(
                "ROW_NUMBER() OVER\n\t\t(\n\t\t\tORDER BY\n\t\t\t\t{}\n\t\t) as [rn1]",
                key
            );
            assert!(sql.contains(&over), "{}", sql);
            let window = RowNumberWindow::from_paging(skip, take).unwrap();
            assert!(sql.ends_with(&window.condition("[t3].[rn1]")), "{}", sql);

            // Evaluate the windowed form and read it back in row-number order.
            let mut numbered = rows.to_vec();
            numbered.sort_by(|a, b| if descending { b.1.cmp(a.1) } else { a.1.cmp(b.1) });
            let windowed: Vec<&str> = numbered
                .iter()
                .zip(1..)
                .filter(|&(_, rn)| window.contains(rn))
                .map(|(row, _)| row.0)
                .collect();

            assert_eq!(
                windowed,
                reference_page(&rows, descending, skip, take),
                "descending {} skip {} take {:?}",
                descending,
                skip,
                take
            );
        }
    }
}
