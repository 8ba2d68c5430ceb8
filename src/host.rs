//! The `ui` binding handed to host-augmented snippets.

use std::{cell::RefCell, rc::Rc};

use crate::{
    diagnostics::Result,
    sink::{AlertLevel, Widget},
    stdlib::{Exports, expect_array, runtime_error},
    value::{Arity, Value, ValueKind},
};

/// Widgets emitted during one run, in call order.
#[derive(Debug, Clone, Default)]
pub struct HostFrame {
    widgets: Rc<RefCell<Vec<Widget>>>,
}

impl HostFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, widget: Widget) {
        self.widgets.borrow_mut().push(widget);
    }

    pub fn drain(&self) -> Vec<Widget> {
        std::mem::take(&mut *self.widgets.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.widgets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `ui` module whose functions append to this frame.
    pub fn ui_module(&self) -> Value {
        let exports = Exports::default()
            .function("title", Arity::Exact(1), self.text(|text| Widget::Title { text }))
            .function("header", Arity::Exact(1), self.text(|text| Widget::Header { text }))
            .function("subheader", Arity::Exact(1), self.text(|text| Widget::Subheader { text }))
            .function("markdown", Arity::Exact(1), self.text(|text| Widget::Markdown { text }))
            .function("text", Arity::Exact(1), self.text(|text| Widget::Text { text }))
            .function("caption", Arity::Exact(1), self.text(|text| Widget::Caption { text }))
            .function("code", Arity::Range(1, 2), emit(self.clone(), code))
            .function("json", Arity::Exact(1), emit(self.clone(), json))
            .function("table", Arity::Exact(1), emit(self.clone(), table))
            .function("metric", Arity::Range(2, 3), emit(self.clone(), metric))
            .function("divider", Arity::Exact(0), emit(self.clone(), |_| Ok(Widget::Divider)))
            .function("success", Arity::Exact(1), self.alert(AlertLevel::Success))
            .function("info", Arity::Exact(1), self.alert(AlertLevel::Info))
            .function("warning", Arity::Exact(1), self.alert(AlertLevel::Warning))
            .function("error", Arity::Exact(1), self.alert(AlertLevel::Error))
            .function("write", Arity::Variadic, {
                let frame = self.clone();
                move |args: &[Value]| {
                    for value in args {
                        frame.push(written(value));
                    }
                    Ok(Value::unit())
                }
            })
            .build();
        Value::module("ui", exports)
    }

    fn text<F>(&self, make: F) -> impl Fn(&[Value]) -> Result<Value> + 'static + use<F>
    where
        F: Fn(String) -> Widget + 'static,
    {
        emit(self.clone(), move |args| Ok(make(args[0].to_string())))
    }

    fn alert(&self, level: AlertLevel) -> impl Fn(&[Value]) -> Result<Value> + 'static + use<> {
        emit(self.clone(), move |args| {
            Ok(Widget::Alert {
                level,
                message: args[0].to_string(),
            })
        })
    }
}

fn emit<F>(frame: HostFrame, make: F) -> impl Fn(&[Value]) -> Result<Value> + 'static
where
    F: Fn(&[Value]) -> Result<Widget> + 'static,
{
    move |args: &[Value]| {
        frame.push(make(args)?);
        Ok(Value::unit())
    }
}

fn json(args: &[Value]) -> Result<Widget> {
    Ok(Widget::Json {
        value: args[0].to_json(),
    })
}

fn metric(args: &[Value]) -> Result<Widget> {
    Ok(Widget::Metric {
        label: args[0].to_string(),
        value: args[1].to_string(),
        delta: args.get(2).map(ToString::to_string),
    })
}

fn code(args: &[Value]) -> Result<Widget> {
    Ok(Widget::Code {
        source: args[0].to_string(),
        language: args.get(1).map(ToString::to_string),
    })
}

/// Rows are maps (columns come from the first row's keys) or arrays
/// (columns are positions).
fn table(args: &[Value]) -> Result<Widget> {
    let rows = expect_array(&args[0], "ui.table")?;
    let Some(first) = rows.first() else {
        return Ok(Widget::Table {
            columns: Vec::new(),
            rows: Vec::new(),
        });
    };
    match &*first.0 {
        ValueKind::Map(head) => {
            let columns: Vec<String> = head.keys().cloned().collect();
            let cells = rows
                .iter()
                .map(|row| -> Result<Vec<String>> {
                    let ValueKind::Map(map) = &*row.0 else {
                        return Err(runtime_error("ui.table rows must all be maps"));
                    };
                    Ok(columns
                        .iter()
                        .map(|column| map.get(column).map(cell).unwrap_or_default())
                        .collect())
                })
                .collect::<Result<Vec<Vec<String>>>>()?;
            Ok(Widget::Table {
                columns,
                rows: cells,
            })
        }
        ValueKind::Array(_) => {
            let cells = rows
                .iter()
                .map(|row| -> Result<Vec<String>> {
                    Ok(expect_array(row, "ui.table")?.iter().map(cell).collect())
                })
                .collect::<Result<Vec<Vec<String>>>>()?;
            let width = cells.iter().map(Vec::len).max().unwrap_or(0);
            Ok(Widget::Table {
                columns: (0..width).map(|idx| idx.to_string()).collect(),
                rows: cells,
            })
        }
        _ => Err(runtime_error("ui.table expects an array of maps or arrays")),
    }
}

fn cell(value: &Value) -> String {
    match &*value.0 {
        ValueKind::Unit => String::new(),
        _ => value.to_string(),
    }
}

fn written(value: &Value) -> Widget {
    match &*value.0 {
        ValueKind::String(text) => Widget::Markdown { text: text.clone() },
        ValueKind::Array(_) | ValueKind::Map(_) => Widget::Json {
            value: value.to_json(),
        },
        _ => Widget::Text {
            text: value.to_string(),
        },
    }
}
