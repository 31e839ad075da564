use crate::mutation::PatchGenerator;

pub(crate) struct ApiServerState {
    pub(crate) patch_generator: PatchGenerator,
}
