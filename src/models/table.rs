//! Generic table view-model: a pure mapping from (rows, columns, permitted
//! actions) to rendered header/cell/action data. Every list page in the
//! portal feeds one of these into the shared `components/table.html` partial.

/// A permitted per-row operation. The set of keys a table exposes is declared
/// by the caller; the target URL of each control is supplied per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Edit,
    Delete,
    Preview,
    Download,
    Review,
}

impl RowAction {
    pub fn key(&self) -> &'static str {
        match self {
            RowAction::Edit => "edit",
            RowAction::Delete => "delete",
            RowAction::Preview => "preview",
            RowAction::Download => "download",
            RowAction::Review => "review",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RowAction::Edit => "Edit",
            RowAction::Delete => "Delete",
            RowAction::Preview => "Preview",
            RowAction::Download => "Download",
            RowAction::Review => "Review",
        }
    }

    /// Destructive actions render as CSRF-protected POST forms with a
    /// confirmation prompt; the rest are plain links.
    pub fn is_destructive(&self) -> bool {
        matches!(self, RowAction::Delete)
    }

    pub fn opens_new_tab(&self) -> bool {
        matches!(self, RowAction::Preview | RowAction::Download)
    }
}

enum Renderer<T> {
    /// Plain string coercion of a row field; escaped by the template.
    Text(fn(&T) -> String),
    /// Caller-supplied markup (status badges etc.); rendered raw.
    Html(fn(&T) -> String),
}

/// A column descriptor: key, header label, and how to render a cell.
pub struct Column<T> {
    pub key: &'static str,
    pub label: &'static str,
    render: Renderer<T>,
}

impl<T> Column<T> {
    pub fn text(key: &'static str, label: &'static str, accessor: fn(&T) -> String) -> Self {
        Column { key, label, render: Renderer::Text(accessor) }
    }

    pub fn html(key: &'static str, label: &'static str, renderer: fn(&T) -> String) -> Self {
        Column { key, label, render: Renderer::Html(renderer) }
    }
}

pub struct HeaderCell {
    pub key: &'static str,
    pub label: &'static str,
}

pub struct Cell {
    pub value: String,
    pub is_html: bool,
}

/// A rendered action control for one row.
pub struct ActionControl {
    pub key: &'static str,
    pub label: &'static str,
    pub href: String,
    pub destructive: bool,
    pub new_tab: bool,
}

pub struct Row {
    pub cells: Vec<Cell>,
    pub actions: Vec<ActionControl>,
}

pub struct Table {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Row>,
    pub has_actions: bool,
}

/// Build the table. One action control is emitted per permitted action and
/// row, in the order the permitted set declares them; `url_for` may return
/// None to suppress a control for an individual row. An empty permitted set
/// yields no action column at all.
pub fn build<T>(
    items: &[T],
    columns: &[Column<T>],
    permitted: &[RowAction],
    url_for: impl Fn(RowAction, &T) -> Option<String>,
) -> Table {
    let headers = columns
        .iter()
        .map(|c| HeaderCell { key: c.key, label: c.label })
        .collect();

    let rows = items
        .iter()
        .map(|item| {
            let cells = columns
                .iter()
                .map(|c| match &c.render {
                    Renderer::Text(f) => Cell { value: f(item), is_html: false },
                    Renderer::Html(f) => Cell { value: f(item), is_html: true },
                })
                .collect();

            let actions = permitted
                .iter()
                .filter_map(|action| {
                    url_for(*action, item).map(|href| ActionControl {
                        key: action.key(),
                        label: action.label(),
                        href,
                        destructive: action.is_destructive(),
                        new_tab: action.opens_new_tab(),
                    })
                })
                .collect();

            Row { cells, actions }
        })
        .collect();

    Table {
        headers,
        rows,
        has_actions: !permitted.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        name: String,
        status: String,
    }

    fn items() -> Vec<Item> {
        vec![
            Item { name: "alpha".into(), status: "pending".into() },
            Item { name: "beta".into(), status: "approved".into() },
        ]
    }

    fn columns() -> Vec<Column<Item>> {
        vec![
            Column::text("name", "Name", |i: &Item| i.name.clone()),
            Column::html("status", "Status", |i: &Item| {
                format!("<span class=\"badge\">{}</span>", i.status)
            }),
        ]
    }

    #[test]
    fn one_control_per_permitted_action() {
        let table = build(
            &items(),
            &columns(),
            &[RowAction::Edit, RowAction::Delete, RowAction::Preview],
            |action, item| Some(format!("/items/{}/{}", item.name, action.key())),
        );
        assert!(table.has_actions);
        for row in &table.rows {
            assert_eq!(row.actions.len(), 3);
        }
        assert_eq!(table.rows[0].actions[0].href, "/items/alpha/edit");
        assert_eq!(table.rows[0].actions[1].href, "/items/alpha/delete");
        assert!(table.rows[0].actions[1].destructive);
        assert!(table.rows[0].actions[2].new_tab);
    }

    #[test]
    fn empty_permitted_set_renders_no_action_column() {
        let table = build(&items(), &columns(), &[], |_, _| Some(String::new()));
        assert!(!table.has_actions);
        assert!(table.rows.iter().all(|r| r.actions.is_empty()));
    }

    #[test]
    fn url_for_can_suppress_per_row() {
        let table = build(
            &items(),
            &columns(),
            &[RowAction::Delete],
            |_, item| {
                if item.status == "approved" {
                    None
                } else {
                    Some(format!("/items/{}/delete", item.name))
                }
            },
        );
        assert_eq!(table.rows[0].actions.len(), 1);
        assert!(table.rows[1].actions.is_empty());
    }

    #[test]
    fn custom_renderer_marks_cell_as_html() {
        let table = build(&items(), &columns(), &[], |_, _| None);
        assert_eq!(table.headers.len(), 2);
        assert!(!table.rows[0].cells[0].is_html);
        assert!(table.rows[0].cells[1].is_html);
        assert!(table.rows[0].cells[1].value.contains("badge"));
    }
}
