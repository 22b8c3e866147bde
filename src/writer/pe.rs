//! PE32 container for generated IL-only modules.
//!
//! The image has a fixed shape: DOS header, PE headers and one `.text` section holding the CLI
//! header, the method bodies and the metadata. Nothing in it depends on the time of the build, so
//! identical inputs produce identical files.

use crate::Result;

/// File offset of the PE signature
const PE_HEADER_OFFSET: usize = 0x80;
/// Size of the PE32 optional header including 16 data directories
const OPTIONAL_HEADER_SIZE: u16 = 0xE0;
/// Size of all headers, aligned to the file alignment
const SIZE_OF_HEADERS: u32 = 0x200;

/// Preferred load address of a DLL
pub const IMAGE_BASE: u32 = 0x1000_0000;
/// In-memory section alignment
pub const SECTION_ALIGNMENT: u32 = 0x2000;
/// On-disk section alignment
pub const FILE_ALIGNMENT: u32 = 0x200;
/// RVA of the `.text` section
pub const TEXT_RVA: u32 = SECTION_ALIGNMENT;

const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
// EXECUTABLE_IMAGE | 32BIT_MACHINE | DLL
const IMAGE_FILE_CHARACTERISTICS: u16 = 0x2102;
// DYNAMIC_BASE | NX_COMPAT | NO_SEH | TERMINAL_SERVER_AWARE
const DLL_CHARACTERISTICS: u16 = 0x8540;
const IMAGE_SUBSYSTEM_WINDOWS_CUI: u16 = 3;
// CNT_CODE | MEM_EXECUTE | MEM_READ
const TEXT_CHARACTERISTICS: u32 = 0x6000_0020;
const CLR_RUNTIME_HEADER_DIRECTORY: usize = 14;

fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Wraps the contents of the `.text` section into a PE32 DLL.
///
/// `text` is mapped at [`TEXT_RVA`]; `cli_header_rva` and `cli_header_size` locate the CLI header
/// inside it.
///
/// # Errors
/// Returns [`crate::Error::WriteFailed`] if the section does not fit a 32-bit image.
pub fn build_image(text: &[u8], cli_header_rva: u32, cli_header_size: u32) -> Result<Vec<u8>> {
    let text_size = u32::try_from(text.len()).map_err(|_| crate::Error::WriteFailed {
        message: format!(".text section of {} bytes is too large", text.len()),
    })?;
    let raw_size = align(text_size, FILE_ALIGNMENT);
    let size_of_image = align(TEXT_RVA + text_size, SECTION_ALIGNMENT);

    let mut out = Vec::with_capacity((SIZE_OF_HEADERS + raw_size) as usize);

    // DOS header; everything but the magic and e_lfanew stays zero
    out.extend_from_slice(b"MZ");
    out.resize(0x3C, 0);
    out.extend_from_slice(&(PE_HEADER_OFFSET as u32).to_le_bytes());
    out.resize(PE_HEADER_OFFSET, 0);

    // COFF header
    out.extend_from_slice(b"PE\0\0");
    out.extend_from_slice(&IMAGE_FILE_MACHINE_I386.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes()); // NumberOfSections
    out.extend_from_slice(&0_u32.to_le_bytes()); // TimeDateStamp
    out.extend_from_slice(&0_u32.to_le_bytes()); // PointerToSymbolTable
    out.extend_from_slice(&0_u32.to_le_bytes()); // NumberOfSymbols
    out.extend_from_slice(&OPTIONAL_HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&IMAGE_FILE_CHARACTERISTICS.to_le_bytes());

    // Optional header, standard fields
    let optional_start = out.len();
    out.extend_from_slice(&0x010B_u16.to_le_bytes()); // PE32
    out.push(8); // MajorLinkerVersion
    out.push(0);
    out.extend_from_slice(&raw_size.to_le_bytes()); // SizeOfCode
    out.extend_from_slice(&0_u32.to_le_bytes()); // SizeOfInitializedData
    out.extend_from_slice(&0_u32.to_le_bytes()); // SizeOfUninitializedData
    out.extend_from_slice(&0_u32.to_le_bytes()); // AddressOfEntryPoint
    out.extend_from_slice(&TEXT_RVA.to_le_bytes()); // BaseOfCode
    out.extend_from_slice(&0_u32.to_le_bytes()); // BaseOfData

    // Windows fields
    out.extend_from_slice(&IMAGE_BASE.to_le_bytes());
    out.extend_from_slice(&SECTION_ALIGNMENT.to_le_bytes());
    out.extend_from_slice(&FILE_ALIGNMENT.to_le_bytes());
    out.extend_from_slice(&4_u16.to_le_bytes()); // MajorOperatingSystemVersion
    out.extend_from_slice(&0_u16.to_le_bytes());
    out.extend_from_slice(&0_u16.to_le_bytes()); // MajorImageVersion
    out.extend_from_slice(&0_u16.to_le_bytes());
    out.extend_from_slice(&4_u16.to_le_bytes()); // MajorSubsystemVersion
    out.extend_from_slice(&0_u16.to_le_bytes());
    out.extend_from_slice(&0_u32.to_le_bytes()); // Win32VersionValue
    out.extend_from_slice(&size_of_image.to_le_bytes());
    out.extend_from_slice(&SIZE_OF_HEADERS.to_le_bytes());
    out.extend_from_slice(&0_u32.to_le_bytes()); // CheckSum
    out.extend_from_slice(&IMAGE_SUBSYSTEM_WINDOWS_CUI.to_le_bytes());
    out.extend_from_slice(&DLL_CHARACTERISTICS.to_le_bytes());
    out.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // SizeOfStackReserve
    out.extend_from_slice(&0x1000_u32.to_le_bytes()); // SizeOfStackCommit
    out.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // SizeOfHeapReserve
    out.extend_from_slice(&0x1000_u32.to_le_bytes()); // SizeOfHeapCommit
    out.extend_from_slice(&0_u32.to_le_bytes()); // LoaderFlags
    out.extend_from_slice(&16_u32.to_le_bytes()); // NumberOfRvaAndSizes

    for directory in 0..16 {
        if directory == CLR_RUNTIME_HEADER_DIRECTORY {
            out.extend_from_slice(&cli_header_rva.to_le_bytes());
            out.extend_from_slice(&cli_header_size.to_le_bytes());
        } else {
            out.extend_from_slice(&[0; 8]);
        }
    }
    debug_assert_eq!(out.len() - optional_start, OPTIONAL_HEADER_SIZE as usize);

    // Section table
    let mut name = [0_u8; 8];
    name[..5].copy_from_slice(b".text");
    out.extend_from_slice(&name);
    out.extend_from_slice(&text_size.to_le_bytes()); // VirtualSize
    out.extend_from_slice(&TEXT_RVA.to_le_bytes());
    out.extend_from_slice(&raw_size.to_le_bytes());
    out.extend_from_slice(&SIZE_OF_HEADERS.to_le_bytes()); // PointerToRawData
    out.extend_from_slice(&[0; 12]); // relocations, line numbers and their counts
    out.extend_from_slice(&TEXT_CHARACTERISTICS.to_le_bytes());

    out.resize(SIZE_OF_HEADERS as usize, 0);
    out.extend_from_slice(text);
    out.resize((SIZE_OF_HEADERS + raw_size) as usize, 0);

    Ok(out)
}
