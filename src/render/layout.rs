//! Page layout engine.
//!
//! Layout is pure and deterministic: content goes in, a `LayoutDocument`
//! of positioned draw operations comes out. Coordinates are millimetres
//! measured from the top-left corner of the page; `render::pdf` flips them
//! into PDF space. Every operation carries a `Role` so documents can be
//! inspected without parsing PDF output.

use serde::Serialize;

use super::wrap::{glyph_width_mm, text_width_mm, wrap_to_width};

const PT_TO_MM: f32 = 0.3528;
/// Smallest size the footer shrinks to before it takes extra lines.
const MIN_FOOTER_FONT: f32 = 6.0;
/// Gap between the header block and its rule, and between the rule and
/// the body.
const HEADER_RULE_GAP: f32 = 4.0;

// ─── Page geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSpec {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    /// Cursor position after the page header.
    pub body_top: f32,
    /// Reserved band at the bottom of every page for the footer.
    pub bottom_exclusion: f32,
    pub line_height: f32,
    pub table_line_height: f32,
    pub cell_padding: f32,
    pub header_row_height: f32,
    pub first_column_width: f32,
    pub section_gap: f32,
    pub indent: f32,
    pub body_font: f32,
    pub section_font: f32,
    pub table_font: f32,
    pub footer_font: f32,
}

impl PageSpec {
    pub fn a4() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin: 15.0,
            body_top: 50.0,
            bottom_exclusion: 25.0,
            line_height: 6.0,
            table_line_height: 5.0,
            cell_padding: 1.5,
            header_row_height: 8.0,
            first_column_width: 12.0,
            section_gap: 4.0,
            indent: 4.0,
            body_font: 10.0,
            section_font: 12.0,
            table_font: 9.0,
            footer_font: 8.0,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Lowest y any body content may reach.
    pub fn body_bottom(&self) -> f32 {
        self.height - self.bottom_exclusion
    }

    /// Height of a table data row holding `lines` wrapped lines.
    pub fn row_height(&self, lines: usize) -> f32 {
        lines.max(1) as f32 * self.table_line_height + 2.0 * self.cell_padding
    }

    /// Column widths: the first column is fixed, the rest share the
    /// remaining width evenly.
    pub fn column_widths(&self, columns: usize) -> Vec<f32> {
        match columns {
            0 => Vec::new(),
            1 => vec![self.content_width()],
            n => {
                let rest = (self.content_width() - self.first_column_width) / (n - 1) as f32;
                std::iter::once(self.first_column_width)
                    .chain(std::iter::repeat(rest).take(n - 1))
                    .collect()
            }
        }
    }
}

// ─── Draw stream ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    Header,
    Footer,
    Body,
    SectionTitle,
    TableHeader { table: usize, col: usize },
    TableCell { table: usize, row: usize, col: usize },
    /// The "No data" row of an empty table.
    TablePlaceholder { table: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    /// `y` is the text baseline.
    Text { x: f32, y: f32, size: f32, bold: bool, text: String, role: Role },
    /// Stroked rectangle; `y` is the top edge.
    Rect { x: f32, y: f32, width: f32, height: f32, role: Role },
    /// Horizontal rule.
    Rule { x1: f32, x2: f32, y: f32, role: Role },
}

impl DrawOp {
    pub fn role(&self) -> Role {
        match self {
            DrawOp::Text { role, .. } | DrawOp::Rect { role, .. } | DrawOp::Rule { role, .. } => {
                *role
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutDocument {
    pub title: String,
    pub spec: PageSpec,
    pub pages: Vec<Page>,
}

impl LayoutDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// `(page index, text)` of every text op whose role matches.
    pub fn texts<F>(&self, mut matches: F) -> Vec<(usize, &str)>
    where
        F: FnMut(Role) -> bool,
    {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| page.ops.iter().map(move |op| (i, op)))
            .filter_map(|(i, op)| match op {
                DrawOp::Text { text, role, .. } if matches(*role) => Some((i, text.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// One line of the repeated page header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLine {
    pub text: String,
    pub size: f32,
    pub bold: bool,
}

// ─── Composer ─────────────────────────────────────────────────────────────────

/// Flows content top to bottom across as many pages as needed.
pub struct Composer {
    spec: PageSpec,
    title: String,
    header: Vec<HeaderLine>,
    done: Vec<Page>,
    current: Page,
    cursor: f32,
    tables: usize,
}

impl Composer {
    /// Header lines wider than the page are wrapped and centred line by
    /// line. A header too tall for `spec.body_top` pushes the body down.
    pub fn new(mut spec: PageSpec, title: &str, header: Vec<HeaderLine>) -> Self {
        let header: Vec<HeaderLine> = header
            .into_iter()
            .flat_map(|line| {
                wrap_to_width(&line.text, spec.content_width(), line.size)
                    .into_iter()
                    .map(move |text| HeaderLine { text, ..line.clone() })
            })
            .collect();
        let header_bottom = spec.margin + header.iter().map(header_line_height).sum::<f32>();
        spec.body_top = spec.body_top.max(header_bottom + 2.0 * HEADER_RULE_GAP);

        let mut composer = Self {
            spec,
            title: title.to_string(),
            header,
            done: Vec::new(),
            current: Page::default(),
            cursor: spec.body_top,
            tables: 0,
        };
        composer.draw_header();
        composer
    }

    pub fn spec(&self) -> &PageSpec {
        &self.spec
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.done.len() + 1
    }

    pub fn start_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.done.push(finished);
        self.cursor = self.spec.body_top;
        self.draw_header();
    }

    /// Starts a new page when `height` more would cross into the footer
    /// band. A page that is still empty is never abandoned, so content
    /// taller than a whole page is drawn where it is. Returns whether a
    /// page break happened.
    pub fn ensure_room(&mut self, height: f32) -> bool {
        if self.cursor + height > self.spec.body_bottom() && self.cursor > self.spec.body_top {
            self.start_page();
            true
        } else {
            false
        }
    }

    pub fn space(&mut self, height: f32) {
        self.cursor += height;
    }

    /// Wrapped paragraph at `indent` from the left margin.
    pub fn text_block(&mut self, text: &str, indent: f32, size: f32, bold: bool) {
        let width = self.spec.content_width() - indent;
        let lh = self.spec.line_height;
        for line in wrap_to_width(text, width, size) {
            self.ensure_room(lh);
            self.current.ops.push(DrawOp::Text {
                x: self.spec.margin + indent,
                y: self.cursor + lh * 0.7,
                size,
                bold,
                text: line,
                role: Role::Body,
            });
            self.cursor += lh;
        }
    }

    /// Titled block; each content entry is an indented paragraph.
    pub fn section(&mut self, title: &str, lines: &[String]) {
        let lh = self.spec.line_height;
        self.cursor += self.spec.section_gap;
        // Keep the title on the same page as its first line.
        self.ensure_room(lh * 2.0);
        self.section_title(title);
        for line in lines {
            self.text_block(line, self.spec.indent, self.spec.body_font, false);
        }
    }

    /// Titled table. The title, the header row and the first data row
    /// always share a page. Returns the table's index in this document.
    pub fn table_section(&mut self, title: &str, headers: &[String], rows: &[Vec<String>]) -> usize {
        let widths = self.spec.column_widths(headers.len());
        let first_row = match rows.first() {
            Some(cells) => self.spec.row_height(max_lines(&self.wrap_row(cells, &widths))),
            None => self.spec.row_height(1),
        };
        self.cursor += self.spec.section_gap;
        self.ensure_room(
            self.spec.line_height
                + self.spec.cell_padding
                + self.spec.header_row_height
                + first_row,
        );
        self.section_title(title);
        self.table(headers, rows)
    }

    fn section_title(&mut self, title: &str) {
        let lh = self.spec.line_height;
        self.current.ops.push(DrawOp::Text {
            x: self.spec.margin,
            y: self.cursor + lh * 0.7,
            size: self.spec.section_font,
            bold: true,
            text: title.to_string(),
            role: Role::SectionTitle,
        });
        self.cursor += lh;
    }

    /// Bordered table with wrapped cells. Returns the table's index in
    /// this document.
    pub fn table(&mut self, headers: &[String], rows: &[Vec<String>]) -> usize {
        let table = self.tables;
        self.tables += 1;

        let widths = self.spec.column_widths(headers.len());
        self.cursor += self.spec.cell_padding;
        self.ensure_room(self.spec.header_row_height + self.spec.row_height(1));
        self.table_header(table, headers, &widths);

        if rows.is_empty() {
            self.placeholder_row(table);
            return table;
        }

        for (row, cells) in rows.iter().enumerate() {
            let wrapped = self.wrap_row(cells, &widths);
            let height = self.spec.row_height(max_lines(&wrapped));

            if self.ensure_room(height) {
                self.table_header(table, headers, &widths);
            }

            let top = self.cursor;
            let mut x = self.spec.margin;
            for (col, (cell_lines, width)) in wrapped.into_iter().zip(&widths).enumerate() {
                let role = Role::TableCell { table, row, col };
                self.current.ops.push(DrawOp::Rect { x, y: top, width: *width, height, role });
                self.cell_text(cell_lines, x, *width, top, height, false, role);
                x += width;
            }
            self.cursor += height;
        }
        table
    }

    /// Each cell wrapped to its column, missing cells as empty text.
    fn wrap_row(&self, cells: &[String], widths: &[f32]) -> Vec<Vec<String>> {
        let padding = self.spec.cell_padding;
        widths
            .iter()
            .enumerate()
            .map(|(col, w)| {
                let cell = cells.get(col).map(String::as_str).unwrap_or("");
                wrap_to_width(cell, w - 2.0 * padding, self.spec.table_font)
            })
            .collect()
    }

    fn table_header(&mut self, table: usize, headers: &[String], widths: &[f32]) {
        let height = self.spec.header_row_height;
        let top = self.cursor;
        let mut x = self.spec.margin;
        for (col, (title, width)) in headers.iter().zip(widths).enumerate() {
            let role = Role::TableHeader { table, col };
            self.current.ops.push(DrawOp::Rect { x, y: top, width: *width, height, role });
            self.cell_text(vec![title.clone()], x, *width, top, height, true, role);
            x += width;
        }
        self.cursor += height;
    }

    fn placeholder_row(&mut self, table: usize) {
        let height = self.spec.row_height(1);
        self.ensure_room(height);
        let role = Role::TablePlaceholder { table };
        let (x, width, top) = (self.spec.margin, self.spec.content_width(), self.cursor);
        self.current.ops.push(DrawOp::Rect { x, y: top, width, height, role });
        self.cell_text(vec!["No data".to_string()], x, width, top, height, false, role);
        self.cursor += height;
    }

    /// Lines centred horizontally in the cell and as a block vertically.
    #[allow(clippy::too_many_arguments)]
    fn cell_text(
        &mut self,
        lines: Vec<String>,
        x: f32,
        width: f32,
        top: f32,
        height: f32,
        bold: bool,
        role: Role,
    ) {
        let size = self.spec.table_font;
        let lh = self.spec.table_line_height;
        let block_top = top + (height - lines.len() as f32 * lh) / 2.0;
        for (i, line) in lines.into_iter().enumerate() {
            let line_x = x + ((width - text_width_mm(&line, size)) / 2.0).max(0.0);
            self.current.ops.push(DrawOp::Text {
                x: line_x,
                y: block_top + i as f32 * lh + lh * 0.7,
                size,
                bold,
                text: line,
                role,
            });
        }
    }

    fn draw_header(&mut self) {
        let mut y = self.spec.margin;
        for line in &self.header {
            y += header_line_height(line);
            let x = ((self.spec.width - text_width_mm(&line.text, line.size)) / 2.0)
                .max(self.spec.margin);
            self.current.ops.push(DrawOp::Text {
                x,
                y,
                size: line.size,
                bold: line.bold,
                text: line.text.clone(),
                role: Role::Header,
            });
        }
        self.current.ops.push(DrawOp::Rule {
            x1: self.spec.margin,
            x2: self.spec.width - self.spec.margin,
            y: self.spec.body_top - HEADER_RULE_GAP,
            role: Role::Header,
        });
    }

    /// Closes the last page and stamps every page with the footer line and
    /// a "Page i of N" counter. A footer too long for one line shrinks and
    /// then wraps; none of it is dropped.
    pub fn finish(self, footer: &str) -> LayoutDocument {
        let Composer { spec, title, mut done, current, .. } = self;
        done.push(current);

        let total = done.len();
        let rule_y = spec.body_bottom() + 5.0;
        let text_y = rule_y + 6.0;
        for (i, page) in done.iter_mut().enumerate() {
            let counter = format!("Page {} of {}", i + 1, total);
            let counter_x = spec.width - spec.margin - text_width_mm(&counter, spec.footer_font);
            let max_footer = counter_x - spec.margin - glyph_width_mm(spec.footer_font) * 2.0;
            let (size, footer_lines) = fit_footer(footer, max_footer, spec.footer_font);

            page.ops.push(DrawOp::Rule {
                x1: spec.margin,
                x2: spec.width - spec.margin,
                y: rule_y,
                role: Role::Footer,
            });
            for (n, line) in footer_lines.into_iter().enumerate() {
                page.ops.push(DrawOp::Text {
                    x: spec.margin,
                    y: text_y + n as f32 * size * PT_TO_MM * 1.3,
                    size,
                    bold: false,
                    text: line,
                    role: Role::Footer,
                });
            }
            page.ops.push(DrawOp::Text {
                x: counter_x,
                y: text_y,
                size: spec.footer_font,
                bold: false,
                text: counter,
                role: Role::Footer,
            });
        }

        LayoutDocument { title, spec, pages: done }
    }
}

fn header_line_height(line: &HeaderLine) -> f32 {
    line.size * PT_TO_MM * 1.4
}

fn max_lines(wrapped: &[Vec<String>]) -> usize {
    wrapped.iter().map(Vec::len).max().unwrap_or(1)
}

/// Largest size, down to `MIN_FOOTER_FONT`, at which the footer fits on
/// two lines. Below that it keeps the minimum size and takes more lines.
fn fit_footer(footer: &str, width: f32, size: f32) -> (f32, Vec<String>) {
    let mut size = size;
    loop {
        let lines = wrap_to_width(footer, width, size);
        if lines.len() <= 2 || size <= MIN_FOOTER_FONT {
            return (size, lines);
        }
        size = (size - 0.5).max(MIN_FOOTER_FONT);
    }
}
