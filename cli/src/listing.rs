use disbrowser::{
    cart::SnesMemory,
    disasm::Disassembly,
    instruction::{Certainty, PrintedCodeUnit},
    vectors::Vector,
};

pub fn print_info(memory: &SnesMemory) {
    let Some(hdr) = memory.header() else {
        println!("no readable header");
        return;
    };
    println!("{:<14}{}", "Title", hdr.title);
    println!("{:<14}{:?}", "Mapping Type", hdr.mapping_type());
    println!("{:<14}{}", "ROM size", hdr.rom_size);
    println!("{:<14}{}", "SRAM size", hdr.ram_size);
    println!(
        "{:<14}{:04x} ({})",
        "Checksum",
        hdr.checksum(),
        if hdr.is_checksum_consistent() {
            "consistent"
        } else {
            "inconsistent"
        }
    );
    println!();
}

pub fn print_vectors(vectors: &[Vector]) {
    for vector in vectors {
        print!(
            "{:<20}{} -> {}",
            vector.name, vector.vector_address, vector.code_address
        );
        match &vector.label {
            Some(label) => println!(" {label}"),
            None => println!(),
        }
    }
    println!();
}

fn certainty_marker(certainty: Certainty) -> char {
    if certainty == Certainty::PROBABLY_CORRECT {
        ' '
    } else if certainty.value() > Certainty::PROBABLY_WRONG.value() {
        '?'
    } else {
        '!'
    }
}

pub fn print_disassembly(disassembly: &Disassembly, printed: &[PrintedCodeUnit]) {
    for (unit, line) in disassembly.iter().zip(printed) {
        if let Some(pre_comment) = &line.pre_comment {
            println!("; {pre_comment}");
        }
        if let Some(label) = &line.label {
            println!("{label}:");
        }
        let mnemonic = match line.secondary_mnemonic {
            Some(alt) => format!("{}/{alt}", line.primary_mnemonic),
            None => line.primary_mnemonic.to_owned(),
        };
        let instruction = format!(
            "{mnemonic}{} {}",
            line.suffix.unwrap_or_default(),
            line.operands
        );
        let mut text = format!(
            "{} {:<9} {} {:<24} {}",
            certainty_marker(line.certainty),
            line.address.as_deref().unwrap_or_default(),
            line.bytes,
            instruction,
            line.state.as_deref().unwrap_or_default(),
        );
        if let Some((target, local)) = disassembly.link(unit) {
            let arrow = if local { "->" } else { "=>" };
            text.push_str(&format!(" {arrow} {target}"));
        }
        if let Some(comment) = &line.comment {
            text.push_str(&format!(" ; {comment}"));
        }
        println!("{}", text.trim_end());
    }
}
