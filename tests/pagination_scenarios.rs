mod common;

use common::{Recorder, ScriptedPages, lines, lines_of, style};
use serde_json::Value;
use std::collections::BTreeMap;
use tablesplit::{
    CellKind, CellSpec, Color, DebugLogger, LaidOutTable, LayoutWarning, MonospaceMeasurer,
    Paginator, Pt, SplitOptions, Table, TableBuilder,
};

fn build(builder: TableBuilder) -> Table {
    builder.build(&MonospaceMeasurer::new()).expect("valid table")
}

fn splitting() -> SplitOptions {
    SplitOptions::default().split_cells_in_final_row(true)
}

fn run(
    table: Table,
    options: SplitOptions,
    pages: &mut ScriptedPages,
) -> (Recorder, LaidOutTable) {
    let mut recorder = Recorder::default();
    let laid_out = Paginator::new(table, options).paginate(&mut recorder, pages);
    (recorder, laid_out)
}

fn read_events(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("read log")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[test]
fn unsplittable_row_moves_whole_to_next_page() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
        vec![lines("a", 2)],
        vec![lines("b", 2)],
        vec![CellSpec::opaque("image", Pt::from_i32(20))],
        vec![lines("d", 2)],
        vec![lines("e", 2)],
    ]));
    // 45pt on the first page; the second page holds the rest.
    let mut pages = ScriptedPages::new(&[45, 100]);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    assert_eq!(recorder.texts_on_page(1), vec!["a0\na1", "b0\nb1"]);
    let second = recorder.on_page(2);
    assert_eq!(second.len(), 3);
    assert!(matches!(second[0].cell.kind(), CellKind::Opaque(_)));
    let tops: Vec<Pt> = second.iter().map(|cell| cell.y).collect();
    assert_eq!(tops, vec![Pt::ZERO, Pt::from_i32(20), Pt::from_i32(40)]);

    let report = laid_out.report();
    assert_eq!(report.pages, 2);
    assert_eq!(report.metrics.whole_row_breaks, 1);
    assert_eq!(report.metrics.splits, 0);
    assert_eq!(
        report.warnings,
        vec![LayoutWarning::UnsplittableRowOverflow { row: 2 }]
    );
    assert_eq!(pages.cursor(), Pt::from_i32(60));
}

#[test]
fn text_row_splits_at_remaining_height() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
        vec![lines("a", 2)],
        vec![lines("b", 2)],
        vec![lines("c", 4)],
        vec![lines("d", 2)],
        vec![lines("e", 2)],
    ]));
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("split.jsonl");
    let logger = DebugLogger::new(&log_path).expect("log");
    // rows a and b take 40pt, leaving 25pt for row c
    let mut pages = ScriptedPages::new(&[65, 100]);
    let mut recorder = Recorder::default();
    let laid_out = Paginator::new(table, splitting())
        .with_logger(logger)
        .paginate(&mut recorder, &mut pages);

    assert_eq!(
        recorder.texts_on_page(1),
        vec!["a0\na1", "b0\nb1", "c0\nc1\n"]
    );
    let split_part = recorder.on_page(1)[2];
    assert_eq!(split_part.cell.height(), Pt::from_i32(20));
    assert!(split_part.continued);

    assert_eq!(recorder.texts_on_page(2), vec!["c2\nc3", "d0\nd1", "e0\ne1"]);
    let continuation = recorder.on_page(2)[0];
    assert_eq!(continuation.y, Pt::ZERO);
    assert_eq!(recorder.on_page(2)[1].y, Pt::from_i32(20));

    let events = read_events(&log_path);
    let split_event = events
        .iter()
        .find(|event| event["type"] == "split.cell")
        .expect("split event");
    assert_eq!(split_event["row"], 2);
    assert_eq!(split_event["budget"].as_f64(), Some(25.0));
    assert_eq!(split_event["lines"], 2);
    assert_eq!(split_event["continued"], true);
    let summary = events.last().expect("summary");
    assert_eq!(summary["type"], "debug.summary");
    assert_eq!(summary["counts"]["split.cell"], 1);

    assert_eq!(laid_out.report().metrics.splits, 1);
    assert_eq!(laid_out.table().row_height(2), Pt::from_i32(20));
    assert!(laid_out.report().warnings.is_empty());
}

fn spanning_split_table() -> Table {
    build(
        TableBuilder::new(vec![Pt::from_i32(100); 2]).rows([
            vec![lines("a", 2), lines("x", 2)],
            vec![lines("b", 2), lines("y", 2)],
            // 12pt lines in the span, 10pt lines beside it
            vec![lines_of("s", 4, 12.0).row_span(2), lines("t", 4)],
            vec![lines("u", 1)],
        ]),
    )
}

#[test]
fn span_split_is_reconciled_before_flushing() {
    let table = spanning_split_table();
    assert_eq!(table.row_height(2), Pt::from_i32(40));
    assert_eq!(table.row_extent(2), Pt::from_i32(50));

    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("split.jsonl");
    let mut pages = ScriptedPages::new(&[65, 100]);
    let mut recorder = Recorder::default();
    let laid_out = Paginator::new(table, splitting())
        .with_logger(DebugLogger::new(&log_path).expect("log"))
        .paginate(&mut recorder, &mut pages);

    // 25pt are left at row 2: two 12pt span lines fit, row 3 moves on and
    // the span's extra 4pt land on row 2.
    let first_page = recorder.texts_on_page(1);
    assert!(first_page.contains(&"s0\ns1\n".to_string()));
    assert!(first_page.contains(&"t0\nt1\n".to_string()));
    assert!(first_page.iter().all(|text| !text.contains("s2")));
    assert!(first_page.iter().all(|text| !text.contains("u0")));

    let span_on_first = recorder
        .on_page(1)
        .into_iter()
        .find(|cell| cell.cell.text() == Some("s0\ns1\n"))
        .expect("span part");
    assert_eq!(span_on_first.y, Pt::from_i32(40));
    assert_eq!(span_on_first.cell.height(), Pt::from_i32(24));
    let beside = recorder
        .on_page(1)
        .into_iter()
        .find(|cell| cell.cell.text() == Some("t0\nt1\n"))
        .expect("cell beside the span");
    assert_eq!(beside.cell.height(), Pt::from_i32(24));

    assert_eq!(recorder.texts_on_page(2), vec!["s2\ns3", "t2\nt3", "u0"]);
    let second = recorder.on_page(2);
    assert_eq!(second[0].cell.height(), Pt::from_i32(30));
    assert_eq!(second[1].cell.height(), Pt::from_i32(20));
    assert_eq!(second[2].y, Pt::from_i32(20));
    assert_boxes_hold_content(&recorder);

    let report = laid_out.report();
    assert_eq!(report.metrics.reconciliations, 1);
    assert!(report.warnings.is_empty());
    let events = read_events(&log_path);
    let reconcile = events
        .iter()
        .find(|event| event["type"] == "split.reconcile")
        .expect("reconcile event");
    assert_eq!(reconcile["first_row"], 2);
    assert_eq!(reconcile["resplit"], 0);
}

/// Every drawn cell is at least as tall as what it shows.
fn assert_boxes_hold_content(recorder: &Recorder) {
    for placed in &recorder.placed {
        assert!(
            placed
                .cell
                .content_height()
                .fits_within(placed.cell.height(), Pt::MILLI),
            "cell {}/{} on page {} shows {} in a {} box",
            placed.cell.row(),
            placed.cell.column(),
            placed.page,
            placed.cell.content_height(),
            placed.cell.height()
        );
    }
}

/// Text drawn for each cell across all pages, in drawing order.
fn drawn_by_cell(recorder: &Recorder) -> BTreeMap<(usize, usize), String> {
    let mut drawn: BTreeMap<(usize, usize), String> = BTreeMap::new();
    for placed in &recorder.placed {
        if let Some(text) = placed.cell.text() {
            drawn
                .entry((placed.cell.row(), placed.cell.column()))
                .or_default()
                .push_str(text);
        }
    }
    drawn
}

fn original_by_cell(table: &Table) -> BTreeMap<(usize, usize), String> {
    table
        .cells()
        .iter()
        .filter_map(|cell| Some(((cell.row(), cell.column()), cell.text()?.to_string())))
        .collect()
}

#[test]
fn span_keeps_the_lines_that_fit_beside_a_short_cell() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100); 2]).rows([
        vec![lines("a", 2), lines("x", 2)],
        vec![lines("b", 2), lines("y", 2)],
        vec![lines_of("s", 4, 12.0).row_span(2), lines("t", 1)],
        vec![lines("u", 1)],
    ]));
    let mut pages = ScriptedPages::new(&[65, 100]);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    let span = recorder
        .on_page(1)
        .into_iter()
        .find(|cell| cell.cell.row() == 2 && cell.cell.column() == 0)
        .expect("span on the first page");
    assert_eq!(span.cell.text(), Some("s0\ns1\n"));
    assert_eq!(span.y, Pt::from_i32(40));
    assert_eq!(span.cell.height(), Pt::from_i32(24));
    let below = recorder
        .on_page(1)
        .into_iter()
        .find(|cell| cell.cell.text() == Some("u0"))
        .expect("row 3 starts on the first page");
    assert_eq!(below.y, Pt::from_i32(50));
    assert_eq!(below.cell.height(), Pt::from_i32(14));

    assert_eq!(recorder.texts_on_page(2), vec!["s2\ns3"]);
    assert_boxes_hold_content(&recorder);
    assert!(laid_out.report().warnings.is_empty());
}

#[test]
fn finished_cells_are_not_drawn_again() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100); 2]).rows([
        vec![lines("s", 8).row_span(3), lines("t", 2)],
        vec![lines("u", 2)],
        vec![lines("v", 1)],
    ]));
    let original = original_by_cell(&table);
    let mut pages = ScriptedPages::uniform(45);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    assert_eq!(
        recorder.texts_on_page(1),
        vec!["s0\ns1\ns2\ns3\n", "t0\nt1", "u0\nu1"]
    );
    assert_eq!(recorder.texts_on_page(2), vec!["s4\ns5\ns6\ns7", "v0"]);
    let v = recorder.on_page(2)[1];
    assert_eq!(v.y, Pt::from_i32(30));
    assert!(
        recorder
            .placed
            .iter()
            .all(|cell| cell.cell.text().is_some_and(|text| !text.is_empty()))
    );
    assert_eq!(drawn_by_cell(&recorder), original);
    assert_eq!(laid_out.report().pages, 2);
}

#[test]
fn spanning_layouts_stay_consistent_for_any_page_height() {
    for bottom in 40..90 {
        for table in [spanning_split_table(), {
            build(TableBuilder::new(vec![Pt::from_i32(100); 2]).rows([
                vec![lines("s", 8).row_span(3), lines("t", 2)],
                vec![lines("u", 2)],
                vec![lines("v", 1)],
                vec![lines_of("w", 3, 12.0).row_span(2), lines("x", 3)],
                vec![lines("y", 1)],
            ]))
        }] {
            let original = original_by_cell(&table);
            let mut pages = ScriptedPages::uniform(bottom);
            let (recorder, laid_out) = run(table, splitting(), &mut pages);
            assert_boxes_hold_content(&recorder);
            assert_eq!(drawn_by_cell(&recorder), original, "page bottom {bottom}");
            for cell in &recorder.placed {
                assert!(cell.bottom().fits_within(Pt::from_i32(bottom), Pt::MILLI));
            }
            assert!(
                laid_out
                    .report()
                    .warnings
                    .iter()
                    .all(|warning| matches!(warning, LayoutWarning::ZeroHeightBudget { .. })),
                "page bottom {bottom}: {:?}",
                laid_out.report().warnings
            );
        }
    }
}

#[test]
fn row_without_room_for_a_line_moves_whole() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
        vec![lines("a", 2)],
        vec![lines("c", 3)],
    ]));
    // 5pt are left below row 0, less than one 10pt line
    let mut pages = ScriptedPages::new(&[25, 100]);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    assert_eq!(recorder.texts_on_page(1), vec!["a0\na1"]);
    assert_eq!(recorder.texts_on_page(2), vec!["c0\nc1\nc2"]);
    let report = laid_out.report();
    assert_eq!(report.warnings, vec![LayoutWarning::ZeroHeightBudget { row: 1 }]);
    assert_eq!(report.metrics.whole_row_breaks, 1);
    assert_eq!(report.metrics.splits, 0);
}

#[test]
fn styled_text_rows_move_whole() {
    let variants: [fn(CellSpec) -> CellSpec; 3] = [
        |cell| cell.rotated(90.0),
        |cell| cell.leading(Pt::from_i32(2)),
        |cell| cell.single_line(),
    ];
    for styled in variants {
        let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
            vec![lines("a", 2)],
            vec![lines("b", 1)],
            vec![styled(lines("r", 3))],
        ]));
        let mut pages = ScriptedPages::new(&[45, 100]);
        let (recorder, laid_out) = run(table, splitting(), &mut pages);

        assert_eq!(recorder.texts_on_page(1), vec!["a0\na1", "b0"]);
        assert_eq!(recorder.texts_on_page(2), vec!["r0\nr1\nr2"]);
        assert_eq!(
            laid_out.report().warnings,
            vec![LayoutWarning::UnsplittableRowOverflow { row: 2 }]
        );
    }
}

#[test]
fn spanning_cells_equal_the_sum_of_their_rows() {
    let table = spanning_split_table();
    let check = |table: &Table| {
        for cell in table.cells().iter().filter(|cell| !cell.is_placeholder()) {
            assert_eq!(
                cell.height(),
                table.rows_height(cell.row()..=cell.last_row()),
                "cell {}/{}",
                cell.row(),
                cell.column()
            );
        }
    };
    check(&table);
    let mut pages = ScriptedPages::new(&[65, 100]);
    let (_, laid_out) = run(table, splitting(), &mut pages);
    check(laid_out.table());
}

#[test]
fn header_repeats_and_banding_restarts_per_page() {
    let light = Color::rgb(0.9, 0.9, 0.9);
    let dark = Color::rgb(0.6, 0.6, 0.6);
    let mut builder = TableBuilder::new(vec![Pt::from_i32(100)])
        .header_rows(1)
        .row(vec![CellSpec::text("Header").style(style())]);
    for i in 1..=6 {
        builder = builder.row(vec![CellSpec::text(format!("body {i}")).style(style())]);
    }
    let table = build(builder);
    let options = SplitOptions::default().row_colors(vec![light, dark]);
    let mut pages = ScriptedPages::uniform(40);
    let (recorder, laid_out) = run(table, options, &mut pages);

    assert_eq!(
        recorder.texts_on_page(1),
        vec!["Header", "body 1", "body 2", "body 3"]
    );
    assert_eq!(
        recorder.texts_on_page(2),
        vec!["Header", "body 4", "body 5", "body 6"]
    );
    for page in [1, 2] {
        let fills: Vec<Option<Color>> = recorder.on_page(page).iter().map(|c| c.fill).collect();
        assert_eq!(fills, vec![None, Some(light), Some(dark), Some(light)]);
        let tops: Vec<Pt> = recorder.on_page(page).iter().map(|c| c.y).collect();
        assert_eq!(
            tops,
            vec![Pt::ZERO, Pt::from_i32(10), Pt::from_i32(20), Pt::from_i32(30)]
        );
    }
    assert_eq!(laid_out.report().pages, 2);
}

#[test]
fn header_is_not_repeated_when_disabled() {
    let table = build(
        TableBuilder::new(vec![Pt::from_i32(100)])
            .header_rows(1)
            .row(vec![CellSpec::text("Header").style(style())])
            .rows((1..=4).map(|i| vec![CellSpec::text(format!("body {i}")).style(style())])),
    );
    let mut pages = ScriptedPages::uniform(30);
    let (recorder, _) = run(table, SplitOptions::default().repeat_header(false), &mut pages);
    assert_eq!(recorder.texts_on_page(2), vec!["body 3", "body 4"]);
}

#[test]
fn oversized_row_at_page_top_is_placed_anyway() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
        vec![CellSpec::opaque("poster", Pt::from_i32(80))],
        vec![lines("after", 1)],
    ]));
    let mut pages = ScriptedPages::uniform(40);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    assert_eq!(recorder.on_page(1).len(), 1);
    assert_eq!(recorder.texts_on_page(2), vec!["after0"]);
    assert_eq!(recorder.on_page(2)[0].y, Pt::ZERO);
    assert_eq!(
        laid_out.report().warnings,
        vec![LayoutWarning::RowExceedsPage {
            row: 0,
            required: Pt::from_i32(80),
            available: Pt::from_i32(40),
        }]
    );
}

#[test]
fn tall_text_row_continues_over_several_pages() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).row(vec![lines("l", 10)]));
    let mut pages = ScriptedPages::uniform(45);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);

    assert_eq!(recorder.texts_on_page(1), vec!["l0\nl1\nl2\nl3\n"]);
    assert_eq!(recorder.texts_on_page(2), vec!["l4\nl5\nl6\nl7\n"]);
    assert_eq!(recorder.texts_on_page(3), vec!["l8\nl9"]);
    for cell in &recorder.placed {
        assert!(cell.bottom() <= Pt::from_i32(45));
    }
    assert_eq!(laid_out.report().metrics.splits, 2);
    assert_eq!(laid_out.report().pages, 3);
    assert_eq!(recorder.finished_pages, 2);
}

#[test]
fn split_disabled_keeps_rows_whole() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).rows([
        vec![lines("a", 2)],
        vec![lines("c", 4)],
    ]));
    let mut pages = ScriptedPages::uniform(45);
    let (recorder, laid_out) = run(table, SplitOptions::default(), &mut pages);
    assert_eq!(recorder.texts_on_page(1), vec!["a0\na1"]);
    assert_eq!(recorder.texts_on_page(2), vec!["c0\nc1\nc2\nc3"]);
    assert!(laid_out.report().warnings.is_empty());
}

#[test]
fn table_starts_on_a_new_page_when_its_opening_does_not_fit() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).row(vec![lines("a", 2)]));
    let mut pages = ScriptedPages::uniform(40).starting_at(30);
    let (recorder, laid_out) = run(table, SplitOptions::default(), &mut pages);
    // the host page is closed before the table starts
    assert_eq!(recorder.finished_pages, 1);
    assert_eq!(recorder.last_page(), 2);
    assert_eq!(recorder.on_page(2)[0].y, Pt::ZERO);
    assert_eq!(laid_out.report().pages, 1);
}

#[test]
fn splittable_opening_only_needs_its_first_line() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]).row(vec![lines("a", 2)]));
    let mut pages = ScriptedPages::uniform(40).starting_at(30);
    let (recorder, _) = run(table, splitting(), &mut pages);
    assert_eq!(recorder.texts_on_page(1), vec!["a0\n"]);
    assert_eq!(recorder.on_page(1)[0].y, Pt::from_i32(30));
    assert_eq!(recorder.texts_on_page(2), vec!["a1"]);
}

#[test]
fn empty_table_draws_nothing() {
    let table = build(TableBuilder::new(vec![Pt::from_i32(100)]));
    let mut pages = ScriptedPages::uniform(40);
    let (recorder, laid_out) = run(table, splitting(), &mut pages);
    assert!(recorder.placed.is_empty());
    assert_eq!(recorder.finished_pages, 0);
    assert_eq!(laid_out.report().pages, 0);
}
