use super::check_structure;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::properties::{ElementProperties, PropertyCache};
use crate::statics;
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::HashSet;

type XmlWriter = Writer<Vec<u8>>;

/// Namespace declarations (prefix, uri) of each open element, outermost first.
type Scopes = Vec<Vec<(String, String)>>;

/// Write the cached properties of every tracked element back into `document`.
///
/// For each tracked element with a cache entry, the property block inside its extension
/// container is replaced wholesale by the cached set. An empty set removes the block, and the
/// container too when nothing else is left in it. Elements absent from the cache, and
/// everything outside the rewritten containers, pass through untouched. Tracked elements
/// nested inside other tracked elements are rewritten as well.
pub fn inject(
    document: &str,
    cache: &PropertyCache,
    config: &SyncConfig,
) -> Result<String, SyncError> {
    let with_container = {
        let doc = roxmltree::Document::parse(document)?;
        check_structure(&doc, config)?
    };

    let newline = if document.contains(statics::NL_CRLF) {
        statics::NL_CRLF
    } else {
        statics::NL_LF
    };

    let mut reader = Reader::from_str(document);
    let mut writer = Writer::new(Vec::with_capacity(document.len() + 256));
    let mut scopes: Scopes = Vec::new();
    // Indentation of the current line when the previous event was a line break.
    let mut line_indent: Option<String> = None;
    // Innermost last.
    let mut targets: Vec<Target<'_, '_>> = Vec::new();
    let mut rewritten = 0usize;

    loop {
        let event = reader.read_event()?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(t) = targets.last_mut()
            && t.in_container()
        {
            t.handle(event, &mut writer, &mut scopes)?;
            continue;
        }

        let depth = scopes.len();
        let indent = line_indent.take();
        if let Event::Text(t) = &event {
            line_indent = indent_after_break(t)?;
        }

        let tracked = match &event {
            Event::Start(e) => tracked_entry(e, depth, cache, &with_container, config)?,
            Event::Empty(e) => tracked_entry(e, depth, cache, &with_container, config)?
                .filter(|(properties, _)| !properties.is_empty()),
            _ => None,
        };

        match (event, tracked) {
            (Event::Start(e), Some((properties, has_container))) => {
                if let Some(parent) = targets.last_mut() {
                    parent.before_child(&e, depth, &mut writer)?;
                }
                scopes.push(declared_namespaces(&e)?);
                let layout = Layout::new(indent, newline, config);
                targets.push(Target::new(
                    &e,
                    properties,
                    has_container,
                    depth,
                    layout,
                    &scopes,
                    config,
                )?);
                writer.write_event(Event::Start(e))?;
                rewritten += 1;
            }
            (Event::Empty(e), Some((properties, _))) => {
                if let Some(parent) = targets.last_mut() {
                    parent.before_child(&e, depth, &mut writer)?;
                }
                scopes.push(declared_namespaces(&e)?);
                let layout = Layout::new(indent, newline, config);
                let t = Target::new(&e, properties, false, depth, layout, &scopes, config)?;
                scopes.pop();

                writer.write_event(Event::Start(e.borrow()))?;
                t.write_container(&mut writer)?;
                write_ws(&mut writer, &t.layout.line(0))?;
                writer.write_event(Event::End(e.to_end()))?;
                rewritten += 1;
            }
            (event, _) => match targets.last_mut() {
                Some(t) => {
                    if t.handle(event, &mut writer, &mut scopes)? {
                        targets.pop();
                    }
                }
                None => match event {
                    Event::Start(e) => {
                        scopes.push(declared_namespaces(&e)?);
                        writer.write_event(Event::Start(e))?;
                    }
                    Event::End(e) => {
                        scopes.pop();
                        writer.write_event(Event::End(e))?;
                    }
                    other => writer.write_event(other)?,
                },
            },
        }
    }

    tracing::debug!(elements = rewritten, "injected properties");
    let bytes = writer.into_inner();
    Ok(String::from_utf8(bytes).map_err(|e| e.utf8_error())?)
}

/// Indentation used for generated markup, relative to the tracked element's own line.
struct Layout {
    newline: &'static str,
    base: String,
    unit: String,
    /// False when the element does not start on its own line; output stays on one line.
    pretty: bool,
}

impl Layout {
    fn new(indent: Option<String>, newline: &'static str, config: &SyncConfig) -> Self {
        Self {
            newline,
            pretty: indent.is_some(),
            base: indent.unwrap_or_default(),
            unit: config.indent.clone(),
        }
    }

    fn line(&self, level: usize) -> String {
        if !self.pretty {
            return String::new();
        }
        let mut s = String::with_capacity(
            self.newline.len() + self.base.len() + level * self.unit.len(),
        );
        s.push_str(self.newline);
        s.push_str(&self.base);
        for _ in 0..level {
            s.push_str(&self.unit);
        }
        s
    }
}

/// Qualified names of the generated markup.
struct Names {
    container: String,
    properties: String,
    property: String,
    /// `xmlns:` declaration to put on the property block when the namespace is not in scope.
    declare: Option<(String, String)>,
}

impl Names {
    fn resolve(
        element_prefix: Option<&str>,
        scopes: &[Vec<(String, String)>],
        config: &SyncConfig,
    ) -> Self {
        let bound = scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(_, uri)| *uri == config.extension_namespace)
            .map(|(prefix, _)| prefix.clone());

        let (ext_prefix, declare) = match bound {
            Some(prefix) => (prefix, None),
            None => {
                let prefix = config.extension_prefix.clone();
                let attr = if prefix.is_empty() {
                    statics::XML_XMLNS.to_string()
                } else {
                    format!("{}:{prefix}", statics::XML_XMLNS)
                };
                (prefix, Some((attr, config.extension_namespace.clone())))
            }
        };

        Self {
            container: qualify(element_prefix, statics::XML_EXTENSION_ELEMENTS),
            properties: qualify(Some(&ext_prefix), statics::XML_PROPERTIES),
            property: qualify(Some(&ext_prefix), statics::XML_PROPERTY),
            declare,
        }
    }
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}:{local}"),
        _ => local.to_string(),
    }
}

/// An extension container being rewritten; its children are buffered until it closes.
struct Container<'d> {
    start: BytesStart<'d>,
    lead_ws: Option<BytesText<'d>>,
    kept: Vec<Event<'d>>,
    /// Nesting depth inside a property block being dropped.
    skipping: usize,
}

impl<'d> Container<'d> {
    fn take_trailing_ws(&mut self) -> Option<BytesText<'d>> {
        if !matches!(self.kept.last(), Some(Event::Text(t)) if is_whitespace(t)) {
            return None;
        }
        match self.kept.pop() {
            Some(Event::Text(t)) => Some(t),
            _ => None,
        }
    }
}

/// A tracked element whose extension container is being rewritten.
struct Target<'c, 'd> {
    depth: usize,
    properties: &'c ElementProperties,
    names: Names,
    layout: Layout,
    /// The element already has a container somewhere among its children.
    has_container: bool,
    container_done: bool,
    pending_ws: Option<BytesText<'d>>,
    container: Option<Container<'d>>,
}

impl<'c, 'd> Target<'c, 'd> {
    fn new(
        e: &BytesStart<'_>,
        properties: &'c ElementProperties,
        has_container: bool,
        depth: usize,
        layout: Layout,
        scopes: &[Vec<(String, String)>],
        config: &SyncConfig,
    ) -> Result<Self, SyncError> {
        let name = e.name();
        let element_prefix = match name.prefix() {
            Some(p) => Some(std::str::from_utf8(p.into_inner())?),
            None => None,
        };

        Ok(Self {
            depth,
            properties,
            names: Names::resolve(element_prefix, scopes, config),
            layout,
            has_container,
            container_done: false,
            pending_ws: None,
            container: None,
        })
    }

    fn in_container(&self) -> bool {
        self.container.is_some()
    }

    fn needs_container(&self) -> bool {
        !self.has_container && !self.container_done && !self.properties.is_empty()
    }

    /// Called before a child element is written. A new container goes first, after any
    /// documentation.
    fn before_child(
        &mut self,
        e: &BytesStart<'_>,
        depth: usize,
        writer: &mut XmlWriter,
    ) -> Result<(), SyncError> {
        let child_level = depth == self.depth + 1;
        if child_level && !is_local(e, statics::XML_DOCUMENTATION) && self.needs_container() {
            self.container_done = true;
            self.write_container(writer)?;
        }
        self.flush_ws(writer)
    }

    /// Handle one event inside the tracked element. Returns true once the element has closed.
    fn handle(
        &mut self,
        event: Event<'d>,
        writer: &mut XmlWriter,
        scopes: &mut Scopes,
    ) -> Result<bool, SyncError> {
        if let Some(mut container) = self.container.take() {
            if !self.handle_in_container(&mut container, event, writer, scopes)? {
                self.container = Some(container);
            }
            return Ok(false);
        }

        let depth = scopes.len();
        let child_level = depth == self.depth + 1;
        match event {
            Event::Text(t) if child_level && is_whitespace(&t) => {
                if let Some(prev) = self.pending_ws.replace(t) {
                    writer.write_event(Event::Text(prev))?;
                }
            }
            Event::Start(e) if child_level && is_local(&e, statics::XML_EXTENSION_ELEMENTS) => {
                scopes.push(declared_namespaces(&e)?);
                self.container_done = true;
                self.container = Some(Container {
                    start: e,
                    lead_ws: self.pending_ws.take(),
                    kept: Vec::new(),
                    skipping: 0,
                });
            }
            Event::Empty(e) if child_level && is_local(&e, statics::XML_EXTENSION_ELEMENTS) => {
                self.container_done = true;
                let lead_ws = self.pending_ws.take();
                if !self.properties.is_empty() {
                    if let Some(ws) = lead_ws {
                        writer.write_event(Event::Text(ws))?;
                    }
                    writer.write_event(Event::Start(e.borrow()))?;
                    self.write_block(writer, 2)?;
                    write_ws(writer, &self.layout.line(1))?;
                    writer.write_event(Event::End(e.to_end()))?;
                }
            }
            Event::End(e) if child_level => {
                scopes.pop();
                if self.needs_container() {
                    self.write_container(writer)?;
                    if self.pending_ws.is_none() {
                        write_ws(writer, &self.layout.line(0))?;
                    }
                }
                self.flush_ws(writer)?;
                writer.write_event(Event::End(e))?;
                return Ok(true);
            }
            other => {
                match &other {
                    Event::Start(e) | Event::Empty(e) => self.before_child(e, depth, writer)?,
                    _ => self.flush_ws(writer)?,
                }
                match &other {
                    Event::Start(e) => scopes.push(declared_namespaces(e)?),
                    Event::End(_) => {
                        scopes.pop();
                    }
                    _ => {}
                }
                writer.write_event(other)?;
            }
        }
        Ok(false)
    }

    /// Returns true once the container has closed and been written out.
    fn handle_in_container(
        &mut self,
        container: &mut Container<'d>,
        event: Event<'d>,
        writer: &mut XmlWriter,
        scopes: &mut Scopes,
    ) -> Result<bool, SyncError> {
        let block_level = scopes.len() == self.depth + 2;
        match event {
            Event::Start(e) => {
                scopes.push(declared_namespaces(&e)?);
                if container.skipping > 0 {
                    container.skipping += 1;
                } else if block_level && is_local(&e, statics::XML_PROPERTIES) {
                    container.take_trailing_ws();
                    container.skipping = 1;
                } else {
                    container.kept.push(Event::Start(e));
                }
            }
            Event::Empty(e) if container.skipping == 0 => {
                if block_level && is_local(&e, statics::XML_PROPERTIES) {
                    container.take_trailing_ws();
                } else {
                    container.kept.push(Event::Empty(e));
                }
            }
            Event::End(e) => {
                scopes.pop();
                if container.skipping > 0 {
                    container.skipping -= 1;
                } else if scopes.len() == self.depth + 1 {
                    self.finish_container(container, e, writer)?;
                    return Ok(true);
                } else {
                    container.kept.push(Event::End(e));
                }
            }
            other => {
                if container.skipping == 0 {
                    container.kept.push(other);
                }
            }
        }
        Ok(false)
    }

    fn finish_container(
        &self,
        container: &mut Container<'d>,
        end: BytesEnd<'d>,
        writer: &mut XmlWriter,
    ) -> Result<(), SyncError> {
        let close_ws = container.take_trailing_ws();
        let has_other = container.kept.iter().any(|ev| match ev {
            Event::Text(t) => !is_whitespace(t),
            _ => true,
        });
        if !has_other && self.properties.is_empty() {
            // Nothing left: drop the container along with the whitespace that led into it.
            return Ok(());
        }

        if let Some(ws) = container.lead_ws.take() {
            writer.write_event(Event::Text(ws))?;
        }
        writer.write_event(Event::Start(container.start.borrow()))?;
        for ev in container.kept.drain(..) {
            writer.write_event(ev)?;
        }
        if !self.properties.is_empty() {
            self.write_block(writer, 2)?;
        }
        match close_ws {
            Some(ws) => writer.write_event(Event::Text(ws))?,
            None => write_ws(writer, &self.layout.line(1))?,
        }
        writer.write_event(Event::End(end))?;
        Ok(())
    }

    fn flush_ws(&mut self, writer: &mut XmlWriter) -> Result<(), SyncError> {
        if let Some(ws) = self.pending_ws.take() {
            writer.write_event(Event::Text(ws))?;
        }
        Ok(())
    }

    fn write_container(&self, writer: &mut XmlWriter) -> Result<(), SyncError> {
        write_ws(writer, &self.layout.line(1))?;
        writer.write_event(Event::Start(BytesStart::new(self.names.container.as_str())))?;
        self.write_block(writer, 2)?;
        write_ws(writer, &self.layout.line(1))?;
        writer.write_event(Event::End(BytesEnd::new(self.names.container.as_str())))?;
        Ok(())
    }

    fn write_block(&self, writer: &mut XmlWriter, level: usize) -> Result<(), SyncError> {
        write_ws(writer, &self.layout.line(level))?;
        let mut start = BytesStart::new(self.names.properties.as_str());
        if let Some((attr, uri)) = &self.names.declare {
            start.push_attribute((attr.as_str(), uri.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        for (name, value) in self.properties.iter() {
            write_ws(writer, &self.layout.line(level + 1))?;
            let name = escape_attr(name);
            let value = escape_attr(value);
            let mut property = BytesStart::new(self.names.property.as_str());
            property.push_attribute((statics::XML_ATTR_NAME.as_bytes(), name.as_bytes()));
            property.push_attribute((statics::XML_ATTR_VALUE.as_bytes(), value.as_bytes()));
            writer.write_event(Event::Empty(property))?;
        }

        write_ws(writer, &self.layout.line(level))?;
        writer.write_event(Event::End(BytesEnd::new(self.names.properties.as_str())))?;
        Ok(())
    }
}

/// Cached properties of a tracked element, and whether it already has a container.
fn tracked_entry<'c>(
    e: &BytesStart<'_>,
    depth: usize,
    cache: &'c PropertyCache,
    with_container: &HashSet<String>,
    config: &SyncConfig,
) -> Result<Option<(&'c ElementProperties, bool)>, SyncError> {
    if depth > config.max_depth {
        return Ok(None);
    }
    let local = e.local_name();
    if !config.is_tracked(std::str::from_utf8(local.into_inner())?) {
        return Ok(None);
    }
    let Some(attr) = e.try_get_attribute(statics::XML_ATTR_ID)? else {
        return Ok(None);
    };
    let id = attr.unescape_value()?;
    Ok(cache
        .get(&id)
        .map(|properties| (properties, with_container.contains(id.as_ref()))))
}

/// Attribute escaping that also keeps tabs and line breaks, which a parser would otherwise
/// normalise to spaces.
fn escape_attr(raw: &str) -> Cow<'_, str> {
    let escaped = escape(raw);
    if !escaped.contains(['\t', '\n', '\r']) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn declared_namespaces(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, SyncError> {
    let mut out = Vec::new();
    for a in e.attributes() {
        let a = a?;
        let key = std::str::from_utf8(a.key.as_ref())?;
        let prefix = if key == statics::XML_XMLNS {
            String::new()
        } else if let Some(p) = key.strip_prefix("xmlns:") {
            p.to_string()
        } else {
            continue;
        };
        out.push((prefix, a.unescape_value()?.into_owned()));
    }
    Ok(out)
}

fn is_local(e: &BytesStart<'_>, local: &str) -> bool {
    e.local_name().as_ref() == local.as_bytes()
}

fn is_whitespace(t: &BytesText<'_>) -> bool {
    t.iter().all(u8::is_ascii_whitespace)
}

/// Indentation following the last line break of a whitespace-only text node.
fn indent_after_break(t: &BytesText<'_>) -> Result<Option<String>, SyncError> {
    if !is_whitespace(t) {
        return Ok(None);
    }
    let text = std::str::from_utf8(t)?;
    Ok(text
        .rfind('\n')
        .map(|i| text[i + 1..].trim_end_matches('\r').to_string()))
}

fn write_ws(writer: &mut XmlWriter, ws: &str) -> Result<(), SyncError> {
    if !ws.is_empty() {
        writer.write_event(Event::Text(BytesText::from_escaped(ws)))?;
    }
    Ok(())
}
