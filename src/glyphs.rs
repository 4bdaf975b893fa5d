use std::borrow::Cow;

use ratatui::text::{Line, Span};

use crate::context::RowContext;

#[derive(Clone, Copy, Debug)]
pub struct ListGlyphs<'a> {
    pub indent: &'a str,
    pub leaf: &'a str,
    pub expanded: &'a str,
    pub collapsed: &'a str,
    pub selected: &'a str,
    pub unselected: &'a str,
}

impl ListGlyphs<'static> {
    pub const fn unicode() -> Self {
        Self {
            indent: "  ",
            leaf: "•",
            expanded: "▼",
            collapsed: "▶",
            selected: "◉",
            unselected: "○",
        }
    }

    pub const fn ascii() -> Self {
        Self {
            indent: "  ",
            leaf: "*",
            expanded: "v",
            collapsed: ">",
            selected: "[x]",
            unselected: "[ ]",
        }
    }
}

/// Text of a row: its name plus an optional prefix drawn before it.
#[derive(Clone, Debug)]
pub struct RowLabel<'a> {
    pub name: Cow<'a, str>,
    pub prefix: Option<Cow<'a, str>>,
}

impl<'a> RowLabel<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
        }
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<Cow<'a, str>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Supplies row text; rows are laid out by [`row_label_line`].
pub trait RowLabelProvider<Id> {
    fn label(&self, id: Id) -> RowLabel<'_>;
}

/// Draws a whole row.
pub trait RowRenderer<Id> {
    fn line<'a>(&'a self, id: Id, ctx: &RowContext, glyphs: &ListGlyphs<'a>) -> Line<'a>;
}

impl<Id, P> RowRenderer<Id> for P
where
    P: RowLabelProvider<Id>,
{
    fn line<'a>(&'a self, id: Id, ctx: &RowContext, glyphs: &ListGlyphs<'a>) -> Line<'a> {
        row_label_line(ctx, self.label(id), glyphs)
    }
}

pub fn row_label_line<'a>(ctx: &RowContext, label: RowLabel<'a>, glyphs: &ListGlyphs<'a>) -> Line<'a> {
    let RowLabel { name, prefix } = label;
    let prefix = prefix.filter(|value| !value.is_empty());

    if ctx.is_header && !ctx.is_expandable {
        let mut spans = Vec::with_capacity(3);
        if let Some(prefix) = prefix {
            spans.push(Span::styled(prefix, ctx.header_style));
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(name, ctx.header_style));
        return Line::from(spans);
    }

    let mut spans = Vec::with_capacity(ctx.level as usize + 6);
    for _ in 0..ctx.level {
        spans.push(Span::raw(glyphs.indent));
    }

    let expander = if ctx.is_expandable {
        if ctx.is_expanded {
            glyphs.expanded
        } else {
            glyphs.collapsed
        }
    } else if ctx.level == 0 {
        ""
    } else {
        glyphs.leaf
    };
    if !expander.is_empty() {
        spans.push(Span::raw(expander));
        spans.push(Span::raw(" "));
    }

    if ctx.is_selected {
        spans.push(Span::raw(glyphs.selected));
        spans.push(Span::raw(" "));
    }

    if let Some(prefix) = prefix {
        spans.push(Span::raw(prefix));
        spans.push(Span::raw(" "));
    }

    if ctx.is_header {
        spans.push(Span::styled(name, ctx.header_style));
    } else {
        spans.push(Span::raw(name));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ViewKind;
    use ratatui::style::Style;

    fn ctx(level: u16) -> RowContext {
        RowContext {
            level,
            kind: ViewKind::default(),
            is_header: false,
            is_expandable: false,
            is_expanded: false,
            is_selected: false,
            is_pinned: false,
            header_style: Style::default(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn nested_leaf_is_indented() {
        let line = row_label_line(&ctx(2), RowLabel::new("leaf"), &ListGlyphs::ascii());
        assert_eq!(text(&line), "    * leaf");
    }

    #[test]
    fn expander_and_selection_marks() {
        let mut context = ctx(0);
        context.is_expandable = true;
        context.is_selected = true;
        let line = row_label_line(&context, RowLabel::new("dir").prefix("#1"), &ListGlyphs::ascii());
        assert_eq!(text(&line), "> [x] #1 dir");
    }

    #[test]
    fn plain_header_has_no_glyphs() {
        let mut context = ctx(0);
        context.is_header = true;
        let line = row_label_line(&context, RowLabel::new("Section"), &ListGlyphs::unicode());
        assert_eq!(text(&line), "Section");
    }
}
