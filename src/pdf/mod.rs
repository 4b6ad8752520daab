//! # PDF Serializer
//!
//! Takes a sealed `Document` from the layout engine and writes a PDF file.
//!
//! This is a from-scratch PDF 1.7 writer. Only what a book needs is
//! supported: text, internal link annotations, an outline and the info
//! dictionary.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! ## Fonts
//!
//! One resource per script class, and only for classes that actually
//! appear. Standard fonts are Type1 references with WinAnsiEncoding. The
//! built-in CJK face is a Type0 font over a predefined UTF-16 CMap, so
//! nothing is embedded. Custom TrueType fonts are embedded whole as
//! CIDFontType2 with Identity-H encoding, producing 5 PDF objects:
//! FontFile2, FontDescriptor, CIDFont, ToUnicode CMap, and the root Type0
//! dictionary.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use log::debug;
use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::FolioError;
use crate::font::{metrics, CjkFont, CustomFontMetrics, FontContext, FontData};
use crate::layout::{Document, LinkAnnotation, Page, TextLine};
use crate::text::Script;

pub struct PdfWriter;

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        let mut builder = Self {
            objects: Vec::new(),
        };
        for _ in 0..3 {
            builder.reserve();
        }
        builder
    }

    /// Allocate an object ID to be filled in later.
    fn reserve(&mut self) -> usize {
        self.objects.push(PdfObject { data: Vec::new() });
        self.objects.len() - 1
    }

    fn set(&mut self, id: usize, data: Vec<u8>) {
        self.objects[id].data = data;
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        let id = self.reserve();
        self.set(id, data);
        id
    }

    /// Add a FlateDecode stream object. `extra` goes into the stream
    /// dictionary as-is.
    fn push_stream(&mut self, content: &[u8], extra: &str) -> usize {
        let id = self.reserve();
        self.set_stream(id, content, extra);
        id
    }

    /// Store a FlateDecode stream under a reserved ID. `extra` goes into the
    /// stream dictionary after `/Length`.
    fn set_stream(&mut self, id: usize, content: &[u8], extra: &str) {
        let compressed = compress_to_vec_zlib(content, 6);
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Length {}{} /Filter /FlateDecode >>\nstream\n",
            compressed.len(),
            extra
        );
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");
        self.set(id, data);
    }
}

/// A font resource written for one script class.
struct FontResource<'a> {
    script: Script,
    name: String,
    obj_id: usize,
    font: &'a FontData,
}

impl<'a> FontResource<'a> {
    /// Encode a run as a PDF string operand for Tj. Characters the face
    /// cannot show become its placeholder.
    fn encode(&self, text: &str, fonts: &FontContext) -> String {
        match self.font {
            FontData::Standard(_) => {
                let fallback = metrics::unicode_to_winansi(fonts.placeholder(self.script))
                    .unwrap_or(b'?');
                let bytes: Vec<u8> = text
                    .chars()
                    .map(|ch| metrics::unicode_to_winansi(ch).unwrap_or(fallback))
                    .collect();
                format!("({})", escape_pdf_bytes(&bytes))
            }
            FontData::Cjk(_) => {
                let placeholder = fonts.placeholder(self.script);
                let mut hex = String::with_capacity(text.len() * 4);
                let mut units = [0u16; 2];
                for ch in text.chars() {
                    let ch = if ch.is_control() { placeholder } else { ch };
                    for unit in ch.encode_utf16(&mut units) {
                        let _ = write!(hex, "{:04X}", unit);
                    }
                }
                format!("<{}>", hex)
            }
            FontData::Custom { metrics, .. } => {
                let fallback = metrics
                    .glyph_ids
                    .get(&fonts.placeholder(self.script))
                    .copied()
                    .unwrap_or(0);
                let hex: String = text
                    .chars()
                    .map(|ch| {
                        let gid = metrics.glyph_ids.get(&ch).copied().unwrap_or(fallback);
                        format!("{:04X}", gid)
                    })
                    .collect();
                format!("<{}>", hex)
            }
        }
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize a sealed document to PDF bytes.
    pub fn write(&self, doc: &Document, fonts: &FontContext) -> Result<Vec<u8>, FolioError> {
        if !doc.is_sealed() {
            return Err(FolioError::RenderError(
                "document page numbers have not been resolved".to_string(),
            ));
        }

        let mut builder = PdfBuilder::new();
        let font_resources = self.register_fonts(&mut builder, doc, fonts)?;
        let font_dict = Self::build_font_resource_dict(&font_resources);

        // Every page and content stream gets its ID before any annotation or
        // outline item, so destinations can point at any page.
        let page_ids: Vec<(usize, usize)> = doc
            .pages()
            .map(|_| (builder.reserve(), builder.reserve()))
            .collect();

        for (page, &(page_id, content_id)) in doc.pages().zip(&page_ids) {
            let content = self.build_content_stream(page, &font_resources, fonts);
            builder.set_stream(content_id, content.as_bytes(), "");

            let annot_ids: Vec<usize> = page
                .annotations
                .iter()
                .filter_map(|link| {
                    let dest = self.destination(doc, &page_ids, link)?;
                    Some(builder.push(dest.into_bytes()))
                })
                .collect();

            let mut page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << /Font << {} >> >>",
                page.width, page.height, content_id, font_dict
            );
            if !annot_ids.is_empty() {
                let refs: Vec<String> = annot_ids.iter().map(|id| format!("{} 0 R", id)).collect();
                let _ = write!(page_dict, " /Annots [{}]", refs.join(" "));
            }
            page_dict.push_str(" >>");
            builder.set(page_id, page_dict.into_bytes());
        }

        let outline_id = self.write_outline(&mut builder, doc, &page_ids);

        // Catalog (object 1)
        let mut catalog = String::from("<< /Type /Catalog /Pages 2 0 R");
        if let Some(id) = outline_id {
            let _ = write!(catalog, " /Outlines {} 0 R /PageMode /UseOutlines", id);
        }
        if let Some(ref lang) = doc.metadata().language {
            let _ = write!(catalog, " /Lang {}", pdf_text_string(lang));
        }
        catalog.push_str(" >>");
        builder.set(1, catalog.into_bytes());

        // Pages tree (object 2)
        let kids: String = page_ids
            .iter()
            .map(|(id, _)| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.set(
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids,
                page_ids.len()
            )
            .into_bytes(),
        );

        // Info dictionary (metadata)
        let metadata = doc.metadata();
        let mut info = String::from("<< ");
        if let Some(ref title) = metadata.title {
            let _ = write!(info, "/Title {} ", pdf_text_string(title));
        }
        if let Some(ref author) = metadata.author {
            let _ = write!(info, "/Author {} ", pdf_text_string(author));
        }
        let _ = write!(
            info,
            "/Producer (Folio {}) /Creator (Folio) >>",
            env!("CARGO_PKG_VERSION")
        );
        let info_obj_id = builder.push(info.into_bytes());

        debug!(
            "pdf: {} pages, {} fonts, {} objects",
            page_ids.len(),
            font_resources.len(),
            builder.objects.len() - 1
        );
        Ok(self.serialize(&builder, info_obj_id))
    }

    /// Build the PDF content stream for a single page.
    fn build_content_stream(
        &self,
        page: &Page,
        font_resources: &[FontResource<'_>],
        fonts: &FontContext,
    ) -> String {
        let mut stream = String::new();
        for line in &page.lines {
            self.write_line(&mut stream, line, font_resources, fonts);
        }
        stream
    }

    /// One text object per line. Tj advances the text position, so runs
    /// follow each other without further positioning.
    fn write_line(
        &self,
        stream: &mut String,
        line: &TextLine,
        font_resources: &[FontResource<'_>],
        fonts: &FontContext,
    ) {
        if line.runs.is_empty() {
            return;
        }
        let _ = write!(stream, "BT\n{:.2} {:.2} Td\n", line.x, line.y);
        for run in &line.runs {
            let Some(resource) = font_resources.iter().find(|r| r.script == run.script) else {
                continue;
            };
            let _ = write!(
                stream,
                "/{} {:.1} Tf\n{} Tj\n",
                resource.name,
                line.font_size,
                resource.encode(&run.text, fonts)
            );
        }
        stream.push_str("ET\n");
    }

    /// Link annotation dictionary, or `None` if the target is not a page of
    /// this document.
    fn destination(
        &self,
        doc: &Document,
        page_ids: &[(usize, usize)],
        link: &LinkAnnotation,
    ) -> Option<String> {
        let target = doc.page(link.target)?;
        let (target_id, _) = page_ids.get(target.index)?;
        let r = &link.rect;
        Some(format!(
            "<< /Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] \
             /Border [0 0 0] /Dest [{} 0 R /FitH {:.2}] >>",
            r.x0, r.y0, r.x1, r.y1, target_id, target.height
        ))
    }

    /// Write the outline root and its items. Returns the root's ID.
    fn write_outline(
        &self,
        builder: &mut PdfBuilder,
        doc: &Document,
        page_ids: &[(usize, usize)],
    ) -> Option<usize> {
        let outline = doc.outline();
        let (first, last) = (outline.first()?, outline.last()?);

        let root_id = builder.reserve();
        let item_ids: Vec<usize> = outline.nodes.iter().map(|_| builder.reserve()).collect();

        for (node, &id) in outline.nodes.iter().zip(&item_ids) {
            let parent = node.parent.map_or(root_id, |p| item_ids[p]);
            let mut dict = format!(
                "<< /Title {} /Parent {} 0 R",
                pdf_text_string(&node.title),
                parent
            );
            if let Some(prev) = node.prev {
                let _ = write!(dict, " /Prev {} 0 R", item_ids[prev]);
            }
            if let Some(next) = node.next {
                let _ = write!(dict, " /Next {} 0 R", item_ids[next]);
            }
            if let Some(target) = doc.page(node.target) {
                if let Some((target_id, _)) = page_ids.get(target.index) {
                    let _ = write!(dict, " /Dest [{} 0 R /FitH {:.2}]", target_id, target.height);
                }
            }
            dict.push_str(" >>");
            builder.set(id, dict.into_bytes());
        }

        builder.set(
            root_id,
            format!(
                "<< /Type /Outlines /First {} 0 R /Last {} 0 R /Count {} >>",
                item_ids[first],
                item_ids[last],
                outline.count()
            )
            .into_bytes(),
        );
        Some(root_id)
    }

    /// Write a font resource for every script class that appears in the
    /// document. A document with no text at all still gets the narrow face.
    fn register_fonts<'a>(
        &self,
        builder: &mut PdfBuilder,
        doc: &Document,
        fonts: &'a FontContext,
    ) -> Result<Vec<FontResource<'a>>, FolioError> {
        let mut used: HashMap<Script, BTreeSet<char>> = HashMap::new();
        for page in doc.pages() {
            for line in &page.lines {
                for run in &line.runs {
                    used.entry(run.script).or_default().extend(run.text.chars());
                }
            }
        }
        if used.is_empty() {
            used.insert(Script::Narrow, BTreeSet::new());
        }

        let mut resources = Vec::new();
        for (index, script) in [Script::Narrow, Script::Wide].into_iter().enumerate() {
            let Some(chars) = used.get(&script) else {
                continue;
            };
            let font = fonts.font(script);
            let obj_id = match font {
                FontData::Standard(std_font) => builder.push(
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                         /Encoding /WinAnsiEncoding >>",
                        std_font.pdf_name()
                    )
                    .into_bytes(),
                ),
                FontData::Cjk(cjk) => Self::write_cjk_font_objects(builder, *cjk),
                FontData::Custom { data, metrics } => {
                    let char_to_gid = Self::glyph_map(metrics, chars, fonts.placeholder(script));
                    Self::write_custom_font_objects(builder, data, metrics, &char_to_gid)?
                }
            };
            resources.push(FontResource {
                script,
                name: format!("F{}", index),
                obj_id,
                font,
            });
        }
        Ok(resources)
    }

    /// A predefined CJK font: Type0 over a UTF-16 CMap with a CIDFontType0
    /// descendant. Viewers supply the glyphs.
    fn write_cjk_font_objects(builder: &mut PdfBuilder, font: CjkFont) -> usize {
        let descriptor_id = builder.push(
            format!(
                "<< /Type /FontDescriptor /FontName /{} /Flags 6 \
                 /FontBBox [-25 -254 1000 880] /ItalicAngle 0 \
                 /Ascent 880 /Descent -120 /CapHeight 880 /StemV 93 >>",
                font.pdf_name()
            )
            .into_bytes(),
        );
        let cidfont_id = builder.push(
            format!(
                "<< /Type /Font /Subtype /CIDFontType0 /BaseFont /{} \
                 /CIDSystemInfo << /Registry (Adobe) /Ordering ({}) /Supplement 2 >> \
                 /FontDescriptor {} 0 R /DW 1000 >>",
                font.pdf_name(),
                font.ordering(),
                descriptor_id
            )
            .into_bytes(),
        );
        builder.push(
            format!(
                "<< /Type /Font /Subtype /Type0 /BaseFont /{} \
                 /Encoding /{} /DescendantFonts [{} 0 R] >>",
                font.pdf_name(),
                font.encoding(),
                cidfont_id
            )
            .into_bytes(),
        )
    }

    /// Glyphs to describe in `/W` and ToUnicode for the drawn characters.
    /// Characters the face lacks are drawn as the placeholder, so it joins
    /// the map whenever one is missing.
    fn glyph_map(
        metrics: &CustomFontMetrics,
        used_chars: &BTreeSet<char>,
        placeholder: char,
    ) -> HashMap<char, u16> {
        let mut char_to_gid: HashMap<char, u16> = HashMap::new();
        let mut missing = false;
        for ch in used_chars {
            match metrics.glyph_ids.get(ch) {
                Some(&gid) => {
                    char_to_gid.insert(*ch, gid);
                }
                None => missing = true,
            }
        }
        if missing {
            if let Some(&gid) = metrics.glyph_ids.get(&placeholder) {
                char_to_gid.entry(placeholder).or_insert(gid);
            }
        }
        char_to_gid
    }

    fn write_custom_font_objects(
        builder: &mut PdfBuilder,
        ttf_data: &[u8],
        metrics: &CustomFontMetrics,
        char_to_gid: &HashMap<char, u16>,
    ) -> Result<usize, FolioError> {
        let face = ttf_parser::Face::parse(ttf_data, 0).map_err(|e| {
            FolioError::FontError(format!(
                "Failed to parse TTF data for font '{}': {}",
                metrics.family, e
            ))
        })?;

        let pdf_font_name = Self::sanitize_font_name(&metrics.family);

        // 1. FontFile2 stream
        let fontfile2_id =
            builder.push_stream(ttf_data, &format!(" /Length1 {}", ttf_data.len()));

        // 2. FontDescriptor
        let scale = 1000.0 / metrics.units_per_em as f64;
        let bbox = face.global_bounding_box();
        let cap_height = face.capital_height().unwrap_or(metrics.ascender) as f64 * scale;
        let font_descriptor_id = builder.push(
            format!(
                "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
                 /FontBBox [{} {} {} {}] /ItalicAngle 0 \
                 /Ascent {} /Descent {} /CapHeight {} /StemV 80 \
                 /FontFile2 {} 0 R >>",
                pdf_font_name,
                (bbox.x_min as f64 * scale) as i32,
                (bbox.y_min as f64 * scale) as i32,
                (bbox.x_max as f64 * scale) as i32,
                (bbox.y_max as f64 * scale) as i32,
                (metrics.ascender as f64 * scale) as i32,
                (metrics.descender as f64 * scale) as i32,
                cap_height as i32,
                fontfile2_id,
            )
            .into_bytes(),
        );

        // 3. CIDFont dictionary (DescendantFont)
        let default_width = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|adv| (adv as f64 * scale) as u32)
            .unwrap_or(1000);
        let cidfont_id = builder.push(
            format!(
                "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
                 /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
                 /FontDescriptor {} 0 R /DW {} /W {} \
                 /CIDToGIDMap /Identity >>",
                pdf_font_name,
                font_descriptor_id,
                default_width,
                Self::build_w_array(char_to_gid, metrics),
            )
            .into_bytes(),
        );

        // 4. ToUnicode CMap
        let cmap = Self::build_tounicode_cmap(char_to_gid, &pdf_font_name);
        let tounicode_id = builder.push_stream(cmap.as_bytes(), "");

        // 5. Type0 font dictionary (the root, referenced by /Resources)
        Ok(builder.push(
            format!(
                "<< /Type /Font /Subtype /Type0 /BaseFont /{} \
                 /Encoding /Identity-H /DescendantFonts [{} 0 R] \
                 /ToUnicode {} 0 R >>",
                pdf_font_name, cidfont_id, tounicode_id,
            )
            .into_bytes(),
        ))
    }

    /// Build the /W array for per-glyph widths in CIDFont.
    /// Format: [gid [width] gid [width] ...]
    fn build_w_array(char_to_gid: &HashMap<char, u16>, metrics: &CustomFontMetrics) -> String {
        let scale = 1000.0 / metrics.units_per_em as f64;
        let mut entries: Vec<(u16, u32)> = char_to_gid
            .iter()
            .map(|(ch, &gid)| {
                let advance = metrics.advance_widths.get(ch).copied().unwrap_or(0);
                (gid, (advance as f64 * scale) as u32)
            })
            .collect();
        entries.sort_by_key(|(gid, _)| *gid);
        entries.dedup_by_key(|(gid, _)| *gid);

        let mut result = String::from("[");
        for (gid, width) in &entries {
            let _ = write!(result, " {} [{}]", gid, width);
        }
        result.push_str(" ]");
        result
    }

    /// Build a ToUnicode CMap for text extraction/copy-paste support.
    fn build_tounicode_cmap(char_to_gid: &HashMap<char, u16>, font_name: &str) -> String {
        let mut gid_to_unicode: Vec<(u16, char)> =
            char_to_gid.iter().map(|(&ch, &gid)| (gid, ch)).collect();
        gid_to_unicode.sort();

        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo\n");
        cmap.push_str("<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        // beginbfchar blocks are limited to 100 entries
        for chunk in gid_to_unicode.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(gid, ch) in chunk {
                let mut units = [0u16; 2];
                let hex: String = ch
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{:04X}", u))
                    .collect();
                let _ = writeln!(cmap, "<{:04X}> <{}>", gid, hex);
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");
        cmap
    }

    /// Strip a family name down to characters allowed in a PDF name.
    fn sanitize_font_name(family: &str) -> String {
        let name: String = family
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            "CustomFont".to_string()
        } else {
            name
        }
    }

    fn build_font_resource_dict(font_resources: &[FontResource<'_>]) -> String {
        font_resources
            .iter()
            .map(|r| format!("/{} {} 0 R", r.name, r.obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        // Header
        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape a byte string for a PDF literal string. Bytes outside printable
/// ASCII are written as octal escapes.
fn escape_pdf_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// A PDF text string: a literal for plain ASCII, UTF-16BE hex with a byte
/// order mark for anything else.
fn pdf_text_string(s: &str) -> String {
    if s.chars().all(|c| (' '..='~').contains(&c)) {
        return format!("({})", escape_pdf_bytes(s.as_bytes()));
    }
    let mut hex = String::from("<FEFF");
    for unit in s.encode_utf16() {
        let _ = write!(hex, "{:04X}", unit);
    }
    hex.push('>');
    hex
}
