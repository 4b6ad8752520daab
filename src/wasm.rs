use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn render_pdf(json: &str) -> Result<Vec<u8>, JsValue> {
    crate::render_json(json).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Page count and chapter page numbers of a book, as a JSON string.
#[wasm_bindgen]
pub fn layout_info(json: &str) -> Result<String, JsValue> {
    let to_js = |e: crate::FolioError| JsValue::from_str(&e.to_string());
    let book: crate::Book = serde_json::from_str(json).map_err(|e| to_js(e.into()))?;
    let fonts = crate::FontContext::from_sources(&book.fonts).map_err(to_js)?;
    let doc = crate::layout(&book, &fonts).map_err(to_js)?;
    serde_json::to_string(&doc.info()).map_err(|e| JsValue::from_str(&e.to_string()))
}
