//! WASM bindings for CircuitMark.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmSchematic } from 'circuitmark';
//!
//! await init();
//!
//! const schematic = new WasmSchematic(`
//!   ground GND
//!   node v_in, v_out
//!   resistor R1 10k from v_in to v_out
//!   resistor R2 10k from v_out to GND
//! `);
//!
//! pre.textContent = schematic.ascii();
//! container.innerHTML = schematic.svg();
//! ```

use wasm_bindgen::prelude::*;

use crate::{compile, AsciiConfig, Options, Schematic, VectorConfig};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// A compiled schematic.
#[wasm_bindgen]
pub struct WasmSchematic {
    schematic: Schematic,
}

#[wasm_bindgen]
impl WasmSchematic {
    /// Compile a circuit description.
    ///
    /// Throws the rendered diagnostics, one per line, when the description
    /// has errors.
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Result<WasmSchematic, JsValue> {
        let schematic = compile(source, &Options::default()).map_err(|e| match e.diagnostics() {
            Some(diagnostics) => JsValue::from_str(&diagnostics.to_string()),
            None => JsValue::from_str(&e.to_string()),
        })?;
        Ok(WasmSchematic { schematic })
    }

    /// ASCII drawing.
    #[wasm_bindgen]
    pub fn ascii(&self) -> String {
        self.schematic.render_ascii(&AsciiConfig::default())
    }

    /// SVG document.
    #[wasm_bindgen]
    pub fn svg(&self) -> String {
        self.schematic.render_vector(&VectorConfig::default()).to_svg()
    }

    /// Warnings found while compiling, one per line.
    #[wasm_bindgen]
    pub fn diagnostics(&self) -> String {
        self.schematic.diagnostics().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn component_count(&self) -> usize {
        self.schematic.graph().components().len()
    }

    #[wasm_bindgen(getter)]
    pub fn net_count(&self) -> usize {
        self.schematic.graph().nets().len()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
