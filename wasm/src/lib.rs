use std::cell::RefCell;
use std::fmt::Display;

use serde::Deserialize;
use uml_canvas::config::{Config, parse_config};
use uml_canvas::frame_dump::FrameDump;
use uml_canvas::{
    BlockType, Connection, DefaultRenderer, EditorController, EditorError, EditorTarget,
    MeasureTable, Position, Rect, Row, parse_scene, render_svg,
};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasOptions {
    /// Full config document, same shape as the CLI's `--configFile`.
    config: Option<serde_json::Value>,
    font_family: Option<String>,
    font_size: Option<f32>,
}

fn build_config(options: CanvasOptions) -> Result<Config, String> {
    let mut config = match options.config {
        Some(value) => parse_config(&value.to_string()).map_err(|error| error.to_string())?,
        None => Config::default(),
    };
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    Ok(config)
}

fn parse_block_type(kind: &str) -> Result<BlockType, String> {
    match kind {
        "table" => Ok(BlockType::Table),
        "enum" => Ok(BlockType::Enum),
        other => Err(format!("unknown block type `{other}`")),
    }
}

/// Controller state shared with the host. Every entry point borrows it
/// mutably; a call arriving while another one still holds the borrow is
/// rejected with [`EditorError::Busy`].
struct Session {
    controller: RefCell<EditorController>,
    measure: RefCell<MeasureTable>,
    config: Config,
}

impl Session {
    fn new(scene: &str, options: CanvasOptions) -> Result<Self, String> {
        let config = build_config(options)?;
        let (diagram, measure) = parse_scene(scene).map_err(|error| format!("{error:#}"))?;
        let mut controller = EditorController::new(diagram, config.layout.clone());
        controller.recompute(&measure);
        Ok(Self {
            controller: RefCell::new(controller),
            measure: RefCell::new(measure),
            config,
        })
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut EditorController, &mut MeasureTable) -> Result<T, EditorError>,
    ) -> Result<T, String> {
        let mut controller = self
            .controller
            .try_borrow_mut()
            .map_err(|_| EditorError::Busy.to_string())?;
        let mut measure = self
            .measure
            .try_borrow_mut()
            .map_err(|_| EditorError::Busy.to_string())?;
        f(&mut controller, &mut measure).map_err(|error| error.to_string())
    }

    fn record_measurement(&self, key: &str, rect: Rect) -> Result<(), String> {
        self.with(|controller, measure| {
            measure.record(key, rect);
            controller.recompute(&*measure);
            Ok(())
        })
    }

    /// `row_json` has the scene's row shape: `{ id, data? }`.
    fn update_row(&self, key: &str, index: usize, row_json: &str) -> Result<(), String> {
        let row: Row = serde_json::from_str(row_json).map_err(|error| error.to_string())?;
        self.with(|controller, measure| controller.update_row(key, index, row, measure))
    }

    fn remove_row(&self, key: &str, index: usize) -> Result<Row, String> {
        self.with(|controller, measure| controller.remove_row(key, index, measure))
    }

    fn set_block_type(&self, key: &str, kind: &str) -> Result<(), String> {
        let kind = parse_block_type(kind)?;
        self.with(|controller, measure| controller.set_block_type(key, kind, measure))
    }

    /// `connection_json` has the scene's connection shape:
    /// `{ block1Id, fromRow, block2Id, toRow, marker?, label? }`.
    fn add_connection(&self, connection_json: &str) -> Result<(), String> {
        let connection: Connection =
            serde_json::from_str(connection_json).map_err(|error| error.to_string())?;
        self.with(|controller, measure| controller.add_connection(connection, measure))
    }

    fn frame_json(&self) -> Result<String, String> {
        let (controller, measure) = self.borrow()?;
        let frame = controller.frame(&*measure, &self.config.legend);
        serde_json::to_string(&frame).map_err(|error| error.to_string())
    }

    fn dump_json(&self) -> Result<String, String> {
        let (controller, measure) = self.borrow()?;
        let frame = controller.frame(&*measure, &self.config.legend);
        serde_json::to_string(&FrameDump::from_frame(&frame)).map_err(|error| error.to_string())
    }

    fn svg(&self) -> Result<String, String> {
        let (controller, measure) = self.borrow()?;
        let frame = controller.frame(&*measure, &self.config.legend);
        Ok(render_svg(&frame, &self.config, &DefaultRenderer))
    }

    fn borrow(
        &self,
    ) -> Result<
        (
            std::cell::Ref<'_, EditorController>,
            std::cell::Ref<'_, MeasureTable>,
        ),
        String,
    > {
        let controller = self
            .controller
            .try_borrow()
            .map_err(|_| EditorError::Busy.to_string())?;
        let measure = self
            .measure
            .try_borrow()
            .map_err(|_| EditorError::Busy.to_string())?;
        Ok((controller, measure))
    }
}

fn to_js(error: impl Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(to_js)
}

#[wasm_bindgen]
pub struct UmlCanvas {
    session: Session,
}

#[wasm_bindgen]
impl UmlCanvas {
    #[wasm_bindgen(constructor)]
    pub fn new(scene: &str, options_json: Option<String>) -> Result<UmlCanvas, JsValue> {
        let options = match options_json {
            Some(raw) => serde_json::from_str::<CanvasOptions>(&raw).map_err(to_js)?,
            None => CanvasOptions::default(),
        };
        Ok(Self {
            session: Session::new(scene, options).map_err(to_js)?,
        })
    }

    /// Host reports the measured bounding box of a block.
    #[wasm_bindgen(js_name = recordMeasurement)]
    pub fn record_measurement(&self, key: &str, x: f32, y: f32, width: f32, height: f32) -> Result<(), JsValue> {
        self.session
            .record_measurement(key, Rect::new(x, y, width, height))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = dragBlock)]
    pub fn drag_block(&self, key: &str, left: f32, top: f32) -> Result<(), JsValue> {
        self.session
            .with(|controller, measure| controller.drag_block(key, Position::new(left, top), measure))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = addRow)]
    pub fn add_row(&self, key: &str) -> Result<usize, JsValue> {
        self.session
            .with(|controller, measure| controller.add_row(key, measure))
            .map_err(to_js)
    }

    /// Returns the reconciliation as JSON when the click closed the editor, `null` otherwise.
    #[wasm_bindgen(js_name = clickBlockHeader)]
    pub fn click_block_header(&self, key: &str) -> Result<String, JsValue> {
        let reconciliation = self
            .session
            .with(|controller, measure| controller.toggle_editor(EditorTarget::Block(key), measure))
            .map_err(to_js)?;
        json(&reconciliation)
    }

    #[wasm_bindgen(js_name = clickRow)]
    pub fn click_row(&self, key: &str, row_index: usize) -> Result<String, JsValue> {
        let reconciliation = self
            .session
            .with(|controller, measure| controller.click_row(key, row_index, measure))
            .map_err(to_js)?;
        json(&reconciliation)
    }

    #[wasm_bindgen(js_name = clickEnumOptions)]
    pub fn click_enum_options(&self, key: &str) -> Result<String, JsValue> {
        let reconciliation = self
            .session
            .with(|controller, measure| controller.click_enum_options(key, measure))
            .map_err(to_js)?;
        json(&reconciliation)
    }

    #[wasm_bindgen(js_name = closeEditor)]
    pub fn close_editor(&self) -> Result<String, JsValue> {
        let reconciliation = self
            .session
            .with(|controller, measure| Ok(controller.close_editor(measure)))
            .map_err(to_js)?;
        json(&reconciliation)
    }

    /// Selection the host's block and row editors bind to, as JSON.
    #[wasm_bindgen(js_name = editorData)]
    pub fn editor_data(&self) -> Result<String, JsValue> {
        let data = self
            .session
            .with(|controller, _| Ok(controller.editor_data().cloned()))
            .map_err(to_js)?;
        json(&data)
    }

    #[wasm_bindgen(js_name = setBlockId)]
    pub fn set_block_id(&self, key: &str, id: &str) -> Result<(), JsValue> {
        self.session
            .with(|controller, _| controller.set_block_id(key, id))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = updateRow)]
    pub fn update_row(&self, key: &str, index: usize, row_json: &str) -> Result<(), JsValue> {
        self.session.update_row(key, index, row_json).map_err(to_js)
    }

    /// Returns the removed row as JSON.
    #[wasm_bindgen(js_name = removeRow)]
    pub fn remove_row(&self, key: &str, index: usize) -> Result<String, JsValue> {
        let row = self.session.remove_row(key, index).map_err(to_js)?;
        json(&row)
    }

    /// `kind` is `"table"` or `"enum"`.
    #[wasm_bindgen(js_name = setBlockType)]
    pub fn set_block_type(&self, key: &str, kind: &str) -> Result<(), JsValue> {
        self.session.set_block_type(key, kind).map_err(to_js)
    }

    #[wasm_bindgen(js_name = addConnection)]
    pub fn add_connection(&self, connection_json: &str) -> Result<(), JsValue> {
        self.session.add_connection(connection_json).map_err(to_js)
    }

    /// Returns the reconciliation as JSON when the deleted block was being
    /// edited, `null` otherwise.
    #[wasm_bindgen(js_name = deleteBlock)]
    pub fn delete_block(&self, key: &str) -> Result<String, JsValue> {
        let reconciliation = self
            .session
            .with(|controller, measure| controller.delete_block(key, measure))
            .map_err(to_js)?;
        json(&reconciliation)
    }

    #[wasm_bindgen(js_name = openContextMenu)]
    pub fn open_context_menu(&self, client_x: f32, client_y: f32, scroll_x: f32, scroll_y: f32) -> Result<(), JsValue> {
        self.session
            .with(|controller, _| {
                controller.open_context_menu(client_x, client_y, scroll_x, scroll_y);
                Ok(())
            })
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&self, x: f32, y: f32) -> Result<bool, JsValue> {
        self.session
            .with(|controller, _| Ok(controller.pointer_down(x, y)))
            .map_err(to_js)
    }

    /// `kind` is `"table"` or `"enum"`. Returns the new block's key.
    #[wasm_bindgen(js_name = addBlock)]
    pub fn add_block(&self, kind: &str) -> Result<Option<String>, JsValue> {
        let kind = parse_block_type(kind).map_err(to_js)?;
        self.session
            .with(|controller, measure| controller.add_block(kind, measure))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = frameJson)]
    pub fn frame_json(&self) -> Result<String, JsValue> {
        self.session.frame_json().map_err(to_js)
    }

    #[wasm_bindgen(js_name = dumpJson)]
    pub fn dump_json(&self) -> Result<String, JsValue> {
        self.session.dump_json().map_err(to_js)
    }

    #[wasm_bindgen(js_name = renderSvg)]
    pub fn render_svg(&self) -> Result<String, JsValue> {
        self.session.svg().map_err(to_js)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        blocks: [
            { id: "users", type: "table", position: { top: 0, left: 0 },
              rows: [{ id: "id", data: { type: "PK" } }, { id: "role" }] },
            { key: "new-block-enum", id: "Role", type: "enum", position: { top: 0, left: 300 },
              rows: [{ id: "ADMIN" }] },
        ],
        connections: [
            { block1Id: "users", fromRow: 1, block2Id: "new-block-enum", toRow: 0, marker: "Hexagon" },
        ],
        measured: {
            users: { x: 0, y: 0, width: 100, height: 80 },
            "new-block-enum": { x: 300, y: 0, width: 100, height: 60 },
        },
    }"#;

    fn session() -> Session {
        Session::new(SCENE, CanvasOptions::default()).expect("scene should load")
    }

    #[test]
    fn closing_the_editor_rekeys_and_keeps_the_path() {
        let session = session();
        session
            .with(|controller, measure| controller.click_enum_options("new-block-enum", measure))
            .unwrap();
        let reconciliation = session
            .with(|controller, measure| Ok(controller.close_editor(measure)))
            .unwrap()
            .expect("editor was open");
        assert_eq!(reconciliation.renamed("new-block-enum"), Some("Role"));

        let dump = session.dump_json().unwrap();
        assert!(dump.contains("\"to\":\"Role\""));
        assert!(dump.contains("M 100.00 53.33 C"));
    }

    #[test]
    fn row_and_connection_edits_reach_the_controller() {
        let session = session();
        session
            .update_row("users", 1, r#"{ "id": "role_id", "data": { "type": "int" } }"#)
            .unwrap();
        session.set_block_type("users", "table").unwrap();
        session
            .add_connection(r#"{ "block1Id": "users", "fromRow": 0, "block2Id": "new-block-enum", "toRow": 0, "label": "kind" }"#)
            .unwrap();
        {
            let (controller, _) = session.borrow().unwrap();
            let users = controller.diagram().block("users").unwrap();
            assert_eq!(users.rows[1].id, "role_id");
            assert_eq!(users.rows[1].column_type(), Some("int"));
            assert_eq!(controller.diagram().connections().len(), 2);
            assert_eq!(controller.paths().len(), 2);
            assert!(!controller.path_for(1).unwrap().is_empty());
        }

        let removed = session.remove_row("users", 1).unwrap();
        assert_eq!(removed.id, "role_id");
        let (controller, _) = session.borrow().unwrap();
        assert_eq!(controller.diagram().row_count("users"), 1);
    }

    #[test]
    fn malformed_edits_are_reported() {
        let session = session();
        assert!(session.update_row("users", 0, "{ not json").is_err());
        assert!(session.set_block_type("users", "view").is_err());
        assert!(session.add_connection(r#"{ "block1Id": "users" }"#).is_err());
        assert!(session.update_row("missing", 0, r#"{ "id": "x" }"#).is_err());
    }

    #[test]
    fn reentrant_calls_are_rejected() {
        let session = session();
        let nested = session.with(|_, _| Ok(session.frame_json())).unwrap();
        assert_eq!(nested, Err(EditorError::Busy.to_string()));
        let nested_mut = session
            .with(|_, _| Ok(session.record_measurement("users", Rect::new(0.0, 0.0, 1.0, 1.0))))
            .unwrap();
        assert_eq!(nested_mut, Err(EditorError::Busy.to_string()));
    }

    #[test]
    fn options_override_theme_font() {
        let options: CanvasOptions = serde_json::from_str(
            r#"{ "fontSize": 18, "config": { "routing": { "style": "orthogonal" } } }"#,
        )
        .unwrap();
        let config = build_config(options).unwrap();
        assert_eq!(config.theme.font_size, 18.0);
        assert_eq!(
            config.layout.routing.style,
            uml_canvas::config::PathStyle::Orthogonal
        );
    }

    #[test]
    fn renders_svg_from_session() {
        let session = session();
        let svg = session.svg().unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Role"));
        assert_eq!(parse_block_type("enum"), Ok(BlockType::Enum));
        assert!(parse_block_type("view").is_err());
    }
}
