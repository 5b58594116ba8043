/// Output style of the formatters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Style {
    indent: usize,
    multiline_arguments: bool,
}

impl Default for Style {
    fn default() -> Style {
        Style {
            indent: 2,
            multiline_arguments: false,
        }
    }
}

impl Style {
    /// Change the number of spaces used for indentation
    pub fn indent(&mut self, indent: usize) -> &mut Self {
        self.indent = indent;
        self
    }

    /// Set whether to add new lines between arguments
    pub fn multiline_arguments(&mut self, multiline_arguments: bool) -> &mut Self {
        self.multiline_arguments = multiline_arguments;
        self
    }
}

/// Accumulates formatted output with indentation tracking.
#[derive(Debug)]
pub struct Formatter<'a> {
    buf: String,
    style: &'a Style,
    indent: usize,
}

impl<'a> Formatter<'a> {
    pub fn new(style: &'a Style) -> Formatter<'a> {
        Formatter {
            buf: String::with_capacity(1024),
            style,
            indent: 0,
        }
    }

    pub fn indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push(' ');
        }
    }

    pub fn endline(&mut self) {
        self.buf.push('\n');
    }

    pub fn start_block(&mut self) {
        self.buf.push('{');
        self.endline();
        self.indent += self.style.indent;
    }

    pub fn end_block(&mut self) {
        self.indent = self.indent.saturating_sub(self.style.indent);
        self.indent();
        self.buf.push('}');
        self.endline();
    }

    pub fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn multiline_arguments(&self) -> bool {
        self.style.multiline_arguments
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Types that can be printed through a [`Formatter`].
pub trait Displayable {
    fn display(&self, f: &mut Formatter);
}

pub fn format_with_style<T: Displayable + ?Sized>(value: &T, style: &Style) -> String {
    let mut formatter = Formatter::new(style);
    value.display(&mut formatter);
    formatter.into_string()
}

macro_rules! impl_display {
    ($( $typ: ident, )+) => {
        $(
            impl std::fmt::Display for $typ {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&crate::format::format_with_style(self, &Default::default()))
                }
            }
        )+
    };
}
