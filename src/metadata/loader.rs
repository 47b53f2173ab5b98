//! Builds a [`CilModule`] from a PE image.
//!
//! Loading runs in three steps: locate the CLI header, metadata root and streams; read the
//! rows of the tables the model needs; then resolve them into owned members. Method bodies
//! are decoded in parallel since they are independent of each other.
//!
//! Damage that only affects a single member (an undecodable body, an unreadable signature)
//! is recorded on that member or logged and does not fail the load.

use std::{collections::HashMap, sync::Arc};

use rayon::prelude::*;

use crate::{
    disassembler::{decode_stream, Immediate, Instruction},
    file::{io::read_le, parser::Parser, File},
    metadata::{
        cilmodule::{CilModule, USER_STRING_TABLE},
        cor20header::Cor20Header,
        members::{
            FieldDef, MemberRef, MethodCode, MethodDef, MethodSpec, Resource, TypeDef, TypeRef,
        },
        method::{FieldAttributes, MethodAttributes, MethodBody},
        root::Root,
        signatures::{
            element_type, parse_field_signature, parse_member_signature, parse_method_signature,
            ElementKind, MemberSignature, MethodSignature,
        },
        streams::{Blob, Strings, TablesHeader, UserStrings},
        tables::{
            ConstantRaw, FieldPtrRaw, FieldRaw, ManifestResourceRaw, MemberRefRaw, MethodDefRaw,
            MethodPtrRaw, MethodSpecRaw, ModuleRaw, NestedClassRaw, RowReadable, TableId,
            TypeDefRaw, TypeRefRaw,
        },
        token::Token,
    },
    Error::OutOfBounds,
    Result,
};

/// The heaps and tables of one metadata directory.
struct Streams<'a> {
    tables: TablesHeader<'a>,
    strings: Strings<'a>,
    blobs: Blob<'a>,
    userstrings: Option<UserStrings<'a>>,
}

impl<'a> Streams<'a> {
    fn read(metadata: &'a [u8], root: &Root) -> Result<Streams<'a>> {
        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;
        let mut userstrings = None;

        for header in &root.stream_headers {
            let start = header.offset as usize;
            let Some(end) = start.checked_add(header.size as usize) else {
                return Err(OutOfBounds);
            };
            let data = metadata.get(start..end).ok_or(OutOfBounds)?;

            match header.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(data)?),
                "#Strings" => strings = Some(Strings::from(data)?),
                "#Blob" => blobs = Some(Blob::from(data)?),
                "#US" => userstrings = Some(UserStrings::from(data)?),
                _ => {}
            }
        }

        let Some(tables) = tables else {
            return Err(malformed_error!("Metadata has no tables stream"));
        };
        let Some(strings) = strings else {
            return Err(malformed_error!("Metadata has no #Strings heap"));
        };
        let Some(blobs) = blobs else {
            return Err(malformed_error!("Metadata has no #Blob heap"));
        };

        Ok(Streams {
            tables,
            strings,
            blobs,
            userstrings,
        })
    }

    fn rows<T: RowReadable>(&self) -> Result<Vec<T>> {
        self.tables.table::<T>()?.iter().collect()
    }

    fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }
}

/// Load the module held by `file`.
///
/// # Errors
/// Returns an error if the CLI header, metadata root, streams or tables are damaged.
pub(crate) fn load(file: &Arc<File>) -> Result<CilModule> {
    let (clr_rva, clr_size) = file.clr();
    let clr_slice = file.data_slice(file.rva_to_offset(clr_rva as usize)?, clr_size as usize)?;
    let header = Cor20Header::read(clr_slice)?;

    let metadata_offset = file.rva_to_offset(header.meta_data_rva as usize)?;
    let metadata = file.data_slice(metadata_offset, header.meta_data_size as usize)?;
    let root = Root::read(metadata)?;
    let streams = Streams::read(metadata, &root)?;

    log::debug!(
        "Metadata {} with {} tables",
        root.version,
        streams.tables.table_count()
    );

    let name = match streams.rows::<ModuleRaw>()?.first() {
        Some(module) => streams.string(module.name)?,
        None => String::new(),
    };

    let type_refs = streams
        .rows::<TypeRefRaw>()?
        .iter()
        .map(|row| {
            Ok(TypeRef {
                token: Token::from_parts(TableId::TypeRef as u8, row.rid),
                namespace: streams.string(row.type_namespace)?,
                name: streams.string(row.type_name)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let type_rows = streams.rows::<TypeDefRaw>()?;
    let field_rows = streams.rows::<FieldRaw>()?;
    let method_rows = streams.rows::<MethodDefRaw>()?;
    let field_order = streams
        .rows::<FieldPtrRaw>()?
        .iter()
        .map(|row| row.field)
        .collect::<Vec<_>>();
    let method_order = streams
        .rows::<MethodPtrRaw>()?
        .iter()
        .map(|row| row.method)
        .collect::<Vec<_>>();

    let mut types = type_rows
        .iter()
        .map(|row| {
            Ok(TypeDef {
                token: Token::from_parts(TableId::TypeDef as u8, row.rid),
                namespace: streams.string(row.type_namespace)?,
                name: streams.string(row.type_name)?,
                flags: row.flags,
                extends: (!row.extends.is_null()).then(|| row.extends.token()),
                fields: Vec::new(),
                methods: Vec::new(),
                nested_types: Vec::new(),
                enclosing_type: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let field_owners = assign_members(
        &mut types,
        &type_rows,
        |row| row.field_list,
        &field_order,
        field_rows.len(),
        TableId::Field,
        |ty| &mut ty.fields,
    );
    let method_owners = assign_members(
        &mut types,
        &type_rows,
        |row| row.method_list,
        &method_order,
        method_rows.len(),
        TableId::MethodDef,
        |ty| &mut ty.methods,
    );

    for row in streams.rows::<NestedClassRaw>()? {
        let nested = Token::from_parts(TableId::TypeDef as u8, row.nested_class);
        let enclosing = Token::from_parts(TableId::TypeDef as u8, row.enclosing_class);

        let (Some(nested_index), Some(enclosing_index)) = (
            index_of(row.nested_class, types.len()),
            index_of(row.enclosing_class, types.len()),
        ) else {
            log::warn!("NestedClass row {} references missing types", row.rid);
            continue;
        };

        types[nested_index].enclosing_type = Some(enclosing);
        types[enclosing_index].nested_types.push(nested);
    }
    for ty in &mut types {
        ty.nested_types.sort();
    }

    let constants = read_constants(&streams)?;
    let fields = field_rows
        .iter()
        .map(|row| {
            let token = Token::from_parts(TableId::Field as u8, row.rid);
            let signature = streams.blobs.get(row.signature as usize)?;
            let field_type = parse_field_signature(signature).unwrap_or_else(|error| {
                log::warn!("Unreadable signature of field {} - {}", token, error);
                ElementKind::Object
            });

            Ok(FieldDef {
                token,
                name: streams.string(row.name)?,
                declaring_type: owner(&field_owners, row.rid),
                flags: FieldAttributes::from_bits_retain(row.flags),
                field_type,
                constant: constants.get(&row.rid).copied(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let methods = method_rows
        .par_iter()
        .map(|row| {
            let token = Token::from_parts(TableId::MethodDef as u8, row.rid);
            let signature = streams.blobs.get(row.signature as usize)?;
            let signature = parse_method_signature(signature).unwrap_or_else(|error| {
                log::warn!("Unreadable signature of method {} - {}", token, error);
                MethodSignature::new(false, ElementKind::Void, Vec::new())
            });

            Ok(MethodDef {
                token,
                name: streams.string(row.name)?,
                declaring_type: owner(&method_owners, row.rid),
                flags: MethodAttributes::from_bits_retain(row.flags),
                signature,
                code: read_code(file, token, row.rva),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let member_refs = streams
        .rows::<MemberRefRaw>()?
        .iter()
        .map(|row| {
            let token = Token::from_parts(TableId::MemberRef as u8, row.rid);
            let signature = streams.blobs.get(row.signature as usize)?;
            let signature = parse_member_signature(signature).unwrap_or_else(|error| {
                log::warn!("Unreadable signature of member {} - {}", token, error);
                MemberSignature::Method(MethodSignature::new(false, ElementKind::Void, Vec::new()))
            });

            Ok(MemberRef {
                token,
                name: streams.string(row.name)?,
                parent: row.class.token(),
                signature,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let method_specs = streams
        .rows::<MethodSpecRaw>()?
        .iter()
        .map(|row| MethodSpec {
            token: Token::from_parts(TableId::MethodSpec as u8, row.rid),
            method: row.method.token(),
        })
        .collect::<Vec<_>>();

    let user_strings = read_user_strings(&streams, &methods);
    let resources = read_resources(file, &header, &streams)?;

    let entry_point = Token::new(header.entry_point_token);
    let entry_point = (entry_point.table() == TableId::MethodDef as u8 && !entry_point.is_null())
        .then_some(entry_point);

    log::debug!(
        "Loaded {} types, {} methods, {} fields, {} resources",
        types.len(),
        methods.len(),
        fields.len(),
        resources.len()
    );

    Ok(CilModule {
        name,
        entry_point,
        types,
        type_refs,
        methods,
        fields,
        member_refs,
        method_specs,
        user_strings,
        resources,
    })
}

fn index_of(rid: u32, len: usize) -> Option<usize> {
    let index = (rid as usize).checked_sub(1)?;
    (index < len).then_some(index)
}

fn owner(owners: &HashMap<u32, Token>, rid: u32) -> Token {
    owners
        .get(&rid)
        .copied()
        .unwrap_or(Token::from_parts(TableId::TypeDef as u8, 0))
}

/// Distribute the member ranges of the TypeDef rows onto their types.
///
/// Each type owns the members from its list index up to the next type's list index. With
/// a pointer table present the indexes go through it; otherwise they are rids. Returns the
/// owning type of every member rid.
fn assign_members(
    types: &mut [TypeDef],
    type_rows: &[TypeDefRaw],
    list: impl Fn(&TypeDefRaw) -> u32,
    indirection: &[u32],
    member_count: usize,
    table: TableId,
    members: impl Fn(&mut TypeDef) -> &mut Vec<Token>,
) -> HashMap<u32, Token> {
    let list_len = if indirection.is_empty() {
        member_count
    } else {
        indirection.len()
    };

    let mut owners = HashMap::new();
    for (index, row) in type_rows.iter().enumerate() {
        let start = list(row) as usize;
        let end = type_rows
            .get(index + 1)
            .map_or(list_len + 1, |next| list(next) as usize)
            .min(list_len + 1);

        if start == 0 || start >= end {
            continue;
        }

        let owner = types[index].token;
        for position in start..end {
            let rid = if indirection.is_empty() {
                position as u32
            } else {
                indirection[position - 1]
            };

            if rid == 0 || rid as usize > member_count {
                log::warn!("Type {} lists missing member row {}", owner, rid);
                continue;
            }

            members(&mut types[index]).push(Token::from_parts(table as u8, rid));
            owners.insert(rid, owner);
        }
    }

    owners
}

/// Integer default values of fields, keyed by field rid.
fn read_constants(streams: &Streams) -> Result<HashMap<u32, Immediate>> {
    let mut constants = HashMap::new();

    for row in streams.rows::<ConstantRaw>()? {
        if row.parent.table != TableId::Field || row.parent.is_null() {
            continue;
        }

        let blob = streams.blobs.get(row.value as usize)?;
        if let Some(value) = constant_value(row.element_type, blob) {
            constants.insert(row.parent.row, value);
        }
    }

    Ok(constants)
}

fn constant_value(kind: u8, blob: &[u8]) -> Option<Immediate> {
    let value = match kind {
        element_type::BOOLEAN | element_type::U1 => i32::from(read_le::<u8>(blob).ok()?),
        element_type::I1 => i32::from(read_le::<i8>(blob).ok()?),
        element_type::CHAR | element_type::U2 => i32::from(read_le::<u16>(blob).ok()?),
        element_type::I2 => i32::from(read_le::<i16>(blob).ok()?),
        element_type::I4 | element_type::U4 => read_le::<i32>(blob).ok()?,
        element_type::I8 | element_type::U8 => {
            return read_le::<i64>(blob).ok().map(Immediate::Int64)
        }
        _ => return None,
    };

    Some(Immediate::Int32(value))
}

fn read_code(file: &File, token: Token, rva: u32) -> MethodCode {
    if rva == 0 {
        return MethodCode::None;
    }

    let decode = || -> Result<Vec<Instruction>> {
        let offset = file.rva_to_offset(rva as usize)?;
        let data = file.data().get(offset..).ok_or(OutOfBounds)?;
        let body = MethodBody::from(data)?;

        decode_stream(&mut Parser::new(body.code(data)?))
    };

    match decode() {
        Ok(instructions) => MethodCode::Decoded(instructions),
        Err(error) => {
            log::debug!("Method {} has an unreadable body - {}", token, error);
            MethodCode::Malformed(error.to_string())
        }
    }
}

/// Literals referenced by `ldstr` in any decoded body.
fn read_user_strings(streams: &Streams, methods: &[MethodDef]) -> HashMap<u32, String> {
    let Some(heap) = &streams.userstrings else {
        return HashMap::new();
    };

    let mut strings = HashMap::new();
    for method in methods {
        let MethodCode::Decoded(instructions) = &method.code else {
            continue;
        };

        for token in instructions
            .iter()
            .filter(|instruction| instruction.is("ldstr"))
            .filter_map(Instruction::token)
        {
            if token.table() != USER_STRING_TABLE || strings.contains_key(&token.row()) {
                continue;
            }

            match heap.get(token.row() as usize) {
                Ok(literal) => {
                    strings.insert(token.row(), literal);
                }
                Err(error) => log::warn!("Unreadable literal {} - {}", token, error),
            }
        }
    }

    strings
}

fn read_resources(file: &File, header: &Cor20Header, streams: &Streams) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for row in streams.rows::<ManifestResourceRaw>()? {
        if !row.implementation.is_null() {
            continue;
        }

        let name = streams.string(row.name)?;
        let read = || -> Result<Vec<u8>> {
            let directory = file.rva_to_offset(header.resource_rva as usize)?;
            let Some(start) = directory.checked_add(row.offset as usize) else {
                return Err(OutOfBounds);
            };

            let length = read_le::<u32>(file.data_slice(start, 4)?)? as usize;
            Ok(file.data_slice(start + 4, length)?.to_vec())
        };

        match read() {
            Ok(data) => resources.push(Resource { name, data }),
            Err(error) => log::warn!("Unreadable resource '{}' - {}", name, error),
        }
    }

    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        devirtualization::{encode_position, evaluate_field, AnalysisSession},
        metadata::container::CodeContainer,
        test::image::{with_token, ImageBuilder},
    };

    const KEY: i64 = 0x1122_3344_5566_7788;

    const FIELD_I8: [u8; 2] = [0x06, element_type::I8];
    const FIELD_I4: [u8; 2] = [0x06, element_type::I4];
    const INSTANCE_VOID: [u8; 3] = [0x20, 0x00, element_type::VOID];
    const STATIC_VOID: [u8; 3] = [0x00, 0x00, element_type::VOID];
    const STATIC_OBJECT: [u8; 3] = [0x00, 0x00, element_type::OBJECT];
    // instance object (string, string, int64, object[])
    const DISPATCH: [u8; 8] = [0x20, 0x04, 0x1C, 0x0E, 0x0E, 0x0A, 0x1D, 0x1C];

    fn type_def(rid: u32) -> Token {
        Token::from_parts(TableId::TypeDef as u8, rid)
    }

    fn field(rid: u32) -> Token {
        Token::from_parts(TableId::Field as u8, rid)
    }

    fn method(rid: u32) -> Token {
        Token::from_parts(TableId::MethodDef as u8, rid)
    }

    /// Interpreter, a literal key field, a stub calling into the interpreter, two nested
    /// types whose NestedClass rows are out of order and a body that does not parse.
    fn protected_image(position: &str) -> Vec<u8> {
        let mut image = ImageBuilder::new();

        let module_name = image.string("Fixture.exe");
        image.row(TableId::Module, &[0, module_name, 0, 0, 0]);

        let object = image.string("Object");
        let system = image.string("System");
        image.row(TableId::TypeRef, &[0, object, system]);

        let module_type = image.string("<Module>");
        let machine = image.string("Machine");
        let protection = image.string("Protection");
        let program = image.string("Program");
        let sample = image.string("Sample");
        let second = image.string("Second");
        let first = image.string("First");
        // extends System.Object through TypeDefOrRef
        let object_base = (1 << 2) | 1;
        image.row(TableId::TypeDef, &[0, module_type, 0, 0, 1, 1]);
        image.row(TableId::TypeDef, &[0x0010_0001, machine, protection, object_base, 2, 1]);
        image.row(TableId::TypeDef, &[0x0010_0001, program, sample, object_base, 2, 3]);
        image.row(TableId::TypeDef, &[0x0000_0002, second, 0, object_base, 3, 7]);
        image.row(TableId::TypeDef, &[0x0000_0002, first, 0, object_base, 3, 7]);

        // public static literal int64 Key, with a default value
        let key_name = image.string("Key");
        let key_signature = image.blob(&FIELD_I8);
        let key = image.row(TableId::Field, &[0x8056, key_name, key_signature]);
        let counter_name = image.string("counter");
        let counter_signature = image.blob(&FIELD_I4);
        image.row(TableId::Field, &[0x0016, counter_name, counter_signature]);

        let key_value = image.blob(&KEY.to_le_bytes());
        image.row(
            TableId::Constant,
            &[u32::from(element_type::I8), key.row() << 2, key_value],
        );

        let ctor_rva = image.body(&[0x2A]);
        let dispatch_rva = image.body(&[0x14, 0x2A]);

        let resource = image.user_string("payload");
        let position = image.user_string(position);
        let stub_rva = image.body(
            &[
                with_token(0x73, method(1)),
                with_token(0x72, resource),
                with_token(0x72, position),
                with_token(0x7E, key),
                vec![0x14],
                with_token(0x6F, method(2)),
                vec![0x2A],
            ]
            .concat(),
        );

        let greeting = image.user_string("hello");
        let main_rva = image.body(&[with_token(0x72, greeting), vec![0x26, 0x2A]].concat());
        // Low bits 01 name neither a tiny nor a fat header
        let broken_rva = image.raw_body(&[0x01, 0x2A]);

        let names = [".ctor", "Execute", "Run", "Main", "Broken", "External"];
        let methods = [
            (ctor_rva, 0x1886, INSTANCE_VOID.as_slice()),
            (dispatch_rva, 0x0086, DISPATCH.as_slice()),
            (stub_rva, 0x0096, STATIC_OBJECT.as_slice()),
            (main_rva, 0x0096, STATIC_VOID.as_slice()),
            (broken_rva, 0x0096, STATIC_VOID.as_slice()),
            (0, 0x2096, STATIC_VOID.as_slice()),
        ];
        for (name, (rva, flags, signature)) in names.into_iter().zip(methods) {
            let name = image.string(name);
            let signature = image.blob(signature);
            image.row(TableId::MethodDef, &[rva, 0, flags, name, signature, 1]);
        }
        image.entry_point(method(4));

        let payload = image.string("payload");
        let offset = image.resource(&[0xAB; 0x40]);
        image.row(TableId::ManifestResource, &[offset, 0x0001, payload, 0]);

        image.row(TableId::NestedClass, &[5, 3]);
        image.row(TableId::NestedClass, &[4, 3]);

        image.build()
    }

    #[test]
    fn members_follow_list_ranges() {
        let module = CilModule::from_mem(protected_image("p7r9IP=p`A")).unwrap();

        assert_eq!(module.name(), "Fixture.exe");
        assert_eq!(module.types().len(), 5);
        assert_eq!(module.type_refs()[0].namespace, "System");

        let holder = module.type_def(type_def(1)).unwrap();
        assert_eq!(holder.name, "<Module>");
        assert_eq!(holder.fields, vec![field(1)]);
        assert!(holder.methods.is_empty());

        let machine = module.type_by_name("Protection.Machine").unwrap();
        assert_eq!(machine.extends, Some(Token::new(0x0100_0001)));
        assert!(machine.fields.is_empty());
        assert_eq!(machine.methods, vec![method(1), method(2)]);

        let program = module.type_by_name("Sample.Program").unwrap();
        assert_eq!(program.fields, vec![field(2)]);
        assert_eq!(
            program.methods,
            vec![method(3), method(4), method(5), method(6)]
        );

        for nested in [type_def(4), type_def(5)] {
            let ty = module.type_def(nested).unwrap();
            assert!(ty.fields.is_empty() && ty.methods.is_empty());
        }

        assert_eq!(module.field_def(field(2)).unwrap().declaring_type, type_def(3));
        let execute = module.method_def(method(2)).unwrap();
        assert_eq!(execute.declaring_type, type_def(2));
        assert_eq!(execute.signature.params.len(), 4);
        assert_eq!(
            module.method_name(method(3)).as_deref(),
            Some("Sample.Program::Run")
        );
    }

    #[test]
    fn nested_types_are_sorted() {
        let module = CilModule::from_mem(protected_image("p7r9IP=p`A")).unwrap();

        let program = module.type_def(type_def(3)).unwrap();
        assert_eq!(program.nested_types, vec![type_def(4), type_def(5)]);
        assert_eq!(program.enclosing_type, None);
        assert_eq!(
            module.type_def(type_def(5)).unwrap().enclosing_type,
            Some(type_def(3))
        );
    }

    #[test]
    fn bodies_and_literals() {
        let module = CilModule::from_mem(protected_image("p7r9IP=p`A")).unwrap();

        assert_eq!(module.entry_point(), Some(method(4)));

        let main = module.method_instructions(method(4)).unwrap();
        assert_eq!(main.len(), 3);
        assert!(main[0].is("ldstr"));
        assert_eq!(module.user_string(main[0].token().unwrap()), Some("hello"));

        let stub = module.method_instructions(method(3)).unwrap();
        assert_eq!(module.user_string(stub[1].token().unwrap()), Some("payload"));
        assert_eq!(module.user_string(stub[2].token().unwrap()), Some("p7r9IP=p`A"));

        assert!(matches!(
            module.method_def(method(5)).unwrap().code,
            MethodCode::Malformed(_)
        ));
        assert!(module.method_instructions(method(5)).is_err());
        assert_eq!(module.method_def(method(6)).unwrap().code, MethodCode::None);
        assert!(!module.methods_with_bodies().contains(&method(6)));

        assert_eq!(module.resources().len(), 1);
        assert_eq!(module.resources()[0].name, "payload");
        assert_eq!(module.resource("payload"), Some([0xAB; 0x40].as_slice()));
    }

    #[test]
    fn constant_backed_key() {
        let module = CilModule::from_mem(protected_image("p7r9IP=p`A")).unwrap();

        let key = module.field_def(field(1)).unwrap();
        assert_eq!(key.name, "Key");
        assert_eq!(key.declaring_type, type_def(1));
        assert_eq!(key.field_type, ElementKind::I8);
        assert_eq!(key.constant, Some(Immediate::Int64(KEY)));
        assert_eq!(module.field_def(field(2)).unwrap().constant, None);

        assert_eq!(evaluate_field(&module, field(1), 4), Ok(KEY));
    }

    #[test]
    fn loaded_stub_is_located() {
        let position = encode_position(0x10, KEY);
        let module = CilModule::from_mem(protected_image(&position)).unwrap();
        let session = AnalysisSession::new(&module);

        let methods = session.virtualized_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].method, method(3));
        assert_eq!(methods[0].interpreter_type, type_def(2));
        assert_eq!(methods[0].dispatcher, method(2));
        assert_eq!(methods[0].key_field, field(1));
        assert_eq!(session.module_key(), Some(KEY));

        let location = session.bytecode(&methods[0]).unwrap();
        assert_eq!(location.resource, "payload");
        assert_eq!(location.position, 0x10);
        assert_eq!(location.resource_len, Some(0x40));
        assert!(location.in_bounds);
    }

    #[test]
    fn pointer_tables_reorder_members() {
        let mut image = ImageBuilder::new();

        let module_name = image.string("Pointers.dll");
        image.row(TableId::Module, &[0, module_name, 0, 0, 0]);

        let module_type = image.string("<Module>");
        let first = image.string("First");
        let second = image.string("Second");
        let namespace = image.string("Layout");
        image.row(TableId::TypeDef, &[0, module_type, 0, 0, 1, 1]);
        image.row(TableId::TypeDef, &[0x0010_0001, first, namespace, 0, 1, 1]);
        image.row(TableId::TypeDef, &[0x0010_0001, second, namespace, 0, 3, 2]);

        let signature = image.blob(&FIELD_I4);
        for name in ["a", "b", "c"] {
            let name = image.string(name);
            image.row(TableId::Field, &[0x0016, name, signature]);
        }
        for rid in [3, 1, 2] {
            image.row(TableId::FieldPtr, &[rid]);
        }

        let signature = image.blob(&STATIC_VOID);
        for name in ["One", "Two"] {
            let name = image.string(name);
            image.row(TableId::MethodDef, &[0, 0, 0x0096, name, signature, 1]);
        }
        for rid in [2, 1] {
            image.row(TableId::MethodPtr, &[rid]);
        }

        let module = CilModule::from_mem(image.build()).unwrap();

        assert!(module.type_def(type_def(1)).unwrap().fields.is_empty());

        let first = module.type_by_name("Layout.First").unwrap();
        assert_eq!(first.fields, vec![field(3), field(1)]);
        assert_eq!(first.methods, vec![method(2)]);

        let second = module.type_by_name("Layout.Second").unwrap();
        assert_eq!(second.fields, vec![field(2)]);
        assert_eq!(second.methods, vec![method(1)]);

        assert_eq!(module.field_def(field(1)).unwrap().declaring_type, type_def(2));
        assert_eq!(module.field_def(field(2)).unwrap().declaring_type, type_def(3));
        assert_eq!(module.method_def(method(1)).unwrap().declaring_type, type_def(3));
        assert_eq!(module.method_def(method(1)).unwrap().code, MethodCode::None);

        assert_eq!(module.entry_point(), None);
        assert!(module.resources().is_empty());
    }

    #[test]
    fn damaged_metadata_root() {
        let mut image = protected_image("p7r9IP=p`A");
        let root = image
            .windows(4)
            .position(|window| window == b"BSJB")
            .unwrap();
        image[root] = b'X';

        assert!(CilModule::from_mem(image).is_err());
        assert!(CilModule::from_mem(Vec::new()).is_err());
    }
}
