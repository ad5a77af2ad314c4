//! `models` subcommand — list supported device models.

use super::{
    ModelJson, RegisterJson, Result, kv_indent, kv_width, model_table, print_json, protocol_label,
};

pub(super) fn cmd_models(json: bool) -> Result<()> {
    if json {
        let output: Vec<ModelJson> = model_table::ALL_MODELS
            .iter()
            .map(|p| ModelJson {
                name: p.name,
                vendor_id: format!("0x{:04X}", p.vendor_id),
                product_id: format!("0x{:04X}", p.product_id),
                protocol: protocol_label(p.protocol),
                input_report_size: p.input_report_size,
                output_report_size: p.output_report_size,
                registers: p
                    .registers
                    .iter()
                    .map(|r| RegisterJson {
                        name: r.name,
                        address: format!("0x{:04X}", r.address),
                    })
                    .collect(),
            })
            .collect();
        return print_json(&output);
    }

    let w = kv_width(&[], &["Protocol:", "USB ID:", "Report size:", "Registers:"]);
    for (i, p) in model_table::ALL_MODELS.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", p.name);
        kv_indent("Protocol:", protocol_label(p.protocol), w);
        kv_indent(
            "USB ID:",
            format_args!("{:04X}:{:04X}", p.vendor_id, p.product_id),
            w,
        );
        kv_indent(
            "Report size:",
            format_args!("{} in / {} out", p.input_report_size, p.output_report_size),
            w,
        );
        if !p.registers.is_empty() {
            let regs: Vec<String> = p
                .registers
                .iter()
                .map(|r| format!("{} (0x{:04X})", r.name, r.address))
                .collect();
            kv_indent("Registers:", regs.join(", "), w);
        }
    }
    Ok(())
}
