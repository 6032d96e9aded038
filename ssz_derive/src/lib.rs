//! Derives the SSZ trait family for container types.
//!
//! Only structs with named fields are supported. The field order in the
//! struct definition is the serialized field order, which makes the
//! definitions in `types` normative for hashing.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error, Fields, Ident, Type};

#[proc_macro_derive(Ssz)]
pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> Result<TokenStream2, Error> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Ssz cannot be derived for generic types",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(input, "Ssz can only be derived for structs"));
    };

    let Fields::Named(fields) = &data.fields else {
        return Err(Error::new_spanned(
            input,
            "Ssz can only be derived for structs with named fields",
        ));
    };

    let type_name = &input.ident;

    let field_names = fields
        .named
        .iter()
        .map(|field| {
            field
                .ident
                .clone()
                .expect("named fields always have identifiers")
        })
        .collect::<Vec<_>>();

    let field_types = fields
        .named
        .iter()
        .map(|field| field.ty.clone())
        .collect::<Vec<_>>();

    let size_impl = size_impl(type_name, &field_types);
    let read_impl = read_impl(type_name, &field_names, &field_types);
    let write_impl = write_impl(type_name, &field_names, &field_types);
    let hash_impl = hash_impl(type_name, &field_names);

    Ok(quote! {
        #size_impl
        #read_impl
        #write_impl
        #hash_impl
    })
}

fn size_impl(type_name: &Ident, field_types: &[Type]) -> TokenStream2 {
    quote! {
        impl ::ssz::SszSize for #type_name {
            const SIZE: ::ssz::Size = ::ssz::Size::container_of(&[
                #(<#field_types as ::ssz::SszSize>::SIZE,)*
            ]);
        }
    }
}

fn read_impl(type_name: &Ident, field_names: &[Ident], field_types: &[Type]) -> TokenStream2 {
    quote! {
        impl ::ssz::SszRead for #type_name {
            fn from_ssz_unchecked(bytes: &[u8]) -> ::core::result::Result<Self, ::ssz::ReadError> {
                let fixed_length: usize =
                    0 #(+ <#field_types as ::ssz::SszSize>::SIZE.fixed_part())*;

                let mut fixed_cursor = 0_usize;
                let mut offsets = ::std::vec::Vec::<usize>::new();

                #(
                    match <#field_types as ::ssz::SszSize>::SIZE {
                        ::ssz::Size::Fixed { size } => fixed_cursor += size,
                        ::ssz::Size::Variable { .. } => {
                            let subslice = ::ssz::subslice(
                                bytes,
                                fixed_cursor..fixed_cursor + ::ssz::BYTES_PER_LENGTH_OFFSET,
                            )?;
                            offsets.push(::ssz::read_offset(subslice));
                            fixed_cursor += ::ssz::BYTES_PER_LENGTH_OFFSET;
                        }
                    }
                )*

                let _ = fixed_cursor;

                if let Some(first_offset) = offsets.first().copied() {
                    if first_offset != fixed_length {
                        return ::core::result::Result::Err(
                            ::ssz::ReadError::ContainerFirstOffsetMismatch {
                                expected: fixed_length,
                                actual: first_offset,
                            },
                        );
                    }
                }

                offsets.push(bytes.len());

                let mut fixed_cursor = 0_usize;
                let mut variable_index = 0_usize;

                #(
                    let #field_names = match <#field_types as ::ssz::SszSize>::SIZE {
                        ::ssz::Size::Fixed { size } => {
                            let subslice =
                                ::ssz::subslice(bytes, fixed_cursor..fixed_cursor + size)?;
                            fixed_cursor += size;
                            <#field_types as ::ssz::SszRead>::from_ssz_unchecked(subslice)?
                        }
                        ::ssz::Size::Variable { .. } => {
                            let start = offsets[variable_index];
                            let end = offsets[variable_index + 1];
                            variable_index += 1;
                            fixed_cursor += ::ssz::BYTES_PER_LENGTH_OFFSET;
                            let subslice = ::ssz::subslice(bytes, start..end)?;
                            <#field_types as ::ssz::SszRead>::from_ssz(subslice)?
                        }
                    };
                )*

                // The cursors are dead after the last field.
                let _ = fixed_cursor;
                let _ = variable_index;

                ::core::result::Result::Ok(Self {
                    #(#field_names,)*
                })
            }
        }
    }
}

fn write_impl(type_name: &Ident, field_names: &[Ident], field_types: &[Type]) -> TokenStream2 {
    quote! {
        impl ::ssz::SszWrite for #type_name {
            fn write_fixed(&self, bytes: &mut [u8]) {
                let mut cursor = 0_usize;

                #(
                    match <#field_types as ::ssz::SszSize>::SIZE {
                        ::ssz::Size::Fixed { size } => {
                            ::ssz::SszWrite::write_fixed(
                                &self.#field_names,
                                &mut bytes[cursor..cursor + size],
                            );
                            cursor += size;
                        }
                        ::ssz::Size::Variable { .. } => {
                            unreachable!("write_fixed is only called for fixed-size containers")
                        }
                    }
                )*

                let _ = cursor;
            }

            fn write_variable(
                &self,
                bytes: &mut ::std::vec::Vec<u8>,
            ) -> ::core::result::Result<(), ::ssz::WriteError> {
                let length_before = bytes.len();
                let fixed_length: usize =
                    0 #(+ <#field_types as ::ssz::SszSize>::SIZE.fixed_part())*;

                bytes.resize(length_before + fixed_length, 0);

                let mut fixed_cursor = length_before;

                #(
                    match <#field_types as ::ssz::SszSize>::SIZE {
                        ::ssz::Size::Fixed { size } => {
                            ::ssz::SszWrite::write_fixed(
                                &self.#field_names,
                                &mut bytes[fixed_cursor..fixed_cursor + size],
                            );
                            fixed_cursor += size;
                        }
                        ::ssz::Size::Variable { .. } => {
                            let offset = bytes.len() - length_before;
                            ::ssz::write_offset(bytes, fixed_cursor, offset)?;
                            fixed_cursor += ::ssz::BYTES_PER_LENGTH_OFFSET;
                            ::ssz::SszWrite::write_variable(&self.#field_names, bytes)?;
                        }
                    }
                )*

                let _ = fixed_cursor;

                ::core::result::Result::Ok(())
            }
        }
    }
}

fn hash_impl(type_name: &Ident, field_names: &[Ident]) -> TokenStream2 {
    let depth = usize::try_from(field_names.len().next_power_of_two().trailing_zeros())
        .expect("container field counts are small");

    quote! {
        impl ::ssz::SszHash for #type_name {
            type PackingFactor = ::ssz::U1;

            fn hash_tree_root(&self) -> ::ssz::H256 {
                ::ssz::MerkleTree::merkleize_chunks(
                    #depth,
                    [
                        #(::ssz::SszHash::hash_tree_root(&self.#field_names),)*
                    ],
                )
            }
        }
    }
}
