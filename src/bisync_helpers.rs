// Included by driver.rs. The generated register operations expose separate
// blocking and async entry points, so each helper exists once per flavour.

use device_driver::{FieldSet, ReadCapability, RegisterOperation, WriteCapability};

#[only_sync]
fn read_internal<Ifc, Register, Access>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
) -> Result<Register, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: ReadCapability,
{
    op.read()
}

#[only_async]
async fn read_internal<Ifc, Register, Access>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
) -> Result<Register, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: ReadCapability,
{
    op.read_async().await
}

#[only_sync]
fn write_internal<Ifc, Register, Access, R>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
    f: impl FnOnce(&mut Register) -> R,
) -> Result<R, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: WriteCapability,
{
    op.write(f)
}

#[only_async]
async fn write_internal<Ifc, Register, Access, R>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
    f: impl FnOnce(&mut Register) -> R,
) -> Result<R, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: WriteCapability,
{
    op.write_async(f).await
}

#[only_sync]
fn modify_internal<Ifc, Register, Access, R>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
    f: impl FnOnce(&mut Register) -> R,
) -> Result<R, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: ReadCapability + WriteCapability,
{
    op.modify(f)
}

#[only_async]
async fn modify_internal<Ifc, Register, Access, R>(
    op: &mut RegisterOperation<'_, Ifc, u8, Register, Access>,
    f: impl FnOnce(&mut Register) -> R,
) -> Result<R, Ifc::Error>
where
    Ifc: RegisterInterface<AddressType = u8>,
    Register: FieldSet,
    Access: ReadCapability + WriteCapability,
{
    op.modify_async(f).await
}
