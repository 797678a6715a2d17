use windows::{
    core::Interface,
    Win32::{
        Foundation::{CloseHandle, HANDLE, HWND, WAIT_FAILED},
        Graphics::{
            Direct3D::D3D_FEATURE_LEVEL_12_1,
            Direct3D12::{
                D3D12CreateDevice, D3D12GetDebugInterface, ID3D12CommandAllocator,
                ID3D12CommandList, ID3D12CommandQueue, ID3D12Debug, ID3D12Device, ID3D12Fence,
                ID3D12GraphicsCommandList, ID3D12InfoQueue, ID3D12Resource,
                D3D12_COMMAND_LIST_TYPE_DIRECT, D3D12_COMMAND_QUEUE_DESC, D3D12_FENCE_FLAG_NONE,
                D3D12_INFO_QUEUE_FILTER, D3D12_INFO_QUEUE_FILTER_DESC,
                D3D12_MESSAGE_ID_CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE,
                D3D12_MESSAGE_ID_MAP_INVALID_NULLRANGE, D3D12_MESSAGE_ID_UNMAP_INVALID_NULLRANGE,
                D3D12_MESSAGE_SEVERITY_INFO, D3D12_RESOURCE_BARRIER, D3D12_RESOURCE_BARRIER_0,
                D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, D3D12_RESOURCE_BARRIER_FLAG_NONE,
                D3D12_RESOURCE_BARRIER_TYPE_TRANSITION, D3D12_RESOURCE_STATES,
                D3D12_RESOURCE_STATE_PRESENT, D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_TRANSITION_BARRIER,
            },
            Dxgi::{
                CreateDXGIFactory2, DXGIGetDebugInterface1, IDXGIAdapter1, IDXGIDebug1,
                IDXGIFactory6, DXGI_ADAPTER_FLAG, DXGI_ADAPTER_FLAG_NONE,
                DXGI_ADAPTER_FLAG_SOFTWARE, DXGI_CREATE_FACTORY_DEBUG, DXGI_CREATE_FACTORY_FLAGS,
                DXGI_DEBUG_ALL, DXGI_DEBUG_RLO_DETAIL, DXGI_DEBUG_RLO_IGNORE_INTERNAL,
                DXGI_ERROR_NOT_FOUND, DXGI_GPU_PREFERENCE_UNSPECIFIED,
            },
        },
        System::Threading::{CreateEventA, WaitForSingleObject, INFINITE},
    },
};

use crate::{
    app::GraphicsParams,
    device::{activate_debug_layer, select_hardware_adapter, AdapterDesc, AdapterSource},
    error::{Error, Result},
    frame::{FenceTimeline, FrameBackend, GraphicsSystem},
    swapchain::SwapChain,
};

pub type D3d12GraphicsSystem = GraphicsSystem<D3d12Backend, D3d12Fence>;

pub fn transition_barrier(
    resource: &ID3D12Resource,
    state_before: D3D12_RESOURCE_STATES,
    state_after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: std::mem::ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                StateBefore: state_before,
                StateAfter: state_after,
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
            }),
        },
    }
}

/// Creates the device context, swap chain, command resources and frame fence
/// for `hwnd`, in that order.
pub fn create_graphics_system(hwnd: HWND, params: GraphicsParams) -> Result<D3d12GraphicsSystem> {
    let debug_layer = activate_debug_layer(params.enable_debug_layer, enable_debug_layer);

    // Factory.
    let factory_flags = if debug_layer {
        DXGI_CREATE_FACTORY_DEBUG
    } else {
        DXGI_CREATE_FACTORY_FLAGS(0)
    };
    let factory: IDXGIFactory6 = unsafe { CreateDXGIFactory2(factory_flags) }?;

    // Adapter.
    let (_adapter, device) = select_hardware_adapter(&DxgiAdapters { factory: &factory })?;
    if debug_layer {
        filter_info_queue(&device);
    }

    // Resources.
    let command_queue: ID3D12CommandQueue = unsafe {
        device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
            Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
            ..Default::default()
        })
    }?;

    let swap_chain = SwapChain::new(
        &factory,
        &device,
        &command_queue,
        hwnd,
        params.width,
        params.height,
    )?;

    let command_allocator: ID3D12CommandAllocator =
        unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }?;

    // No pipeline state: the frame is a clear only.
    let command_list: ID3D12GraphicsCommandList = unsafe {
        device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &command_allocator, None)
    }?;
    unsafe { command_list.Close() }?;

    let fence = D3d12Fence::new(&device, &command_queue)?;

    let backend = D3d12Backend {
        command_list,
        command_allocator,
        swap_chain,
        command_queue,
        device,
        factory,
    };

    Ok(GraphicsSystem::new(backend, fence))
}

fn enable_debug_layer() -> bool {
    unsafe {
        let mut debug: Option<ID3D12Debug> = None;
        match D3D12GetDebugInterface(&mut debug).ok().and(debug) {
            Some(debug) => {
                debug.EnableDebugLayer();
                true
            }
            None => false,
        }
    }
}

fn filter_info_queue(device: &ID3D12Device) {
    let Ok(info_queue) = device.cast::<ID3D12InfoQueue>() else {
        log::debug!("device has no info queue");
        return;
    };

    let mut severities = [D3D12_MESSAGE_SEVERITY_INFO];
    let mut deny_ids = [
        D3D12_MESSAGE_ID_CLEARRENDERTARGETVIEW_MISMATCHINGCLEARVALUE,
        D3D12_MESSAGE_ID_MAP_INVALID_NULLRANGE,
        D3D12_MESSAGE_ID_UNMAP_INVALID_NULLRANGE,
    ];

    let filter = D3D12_INFO_QUEUE_FILTER {
        DenyList: D3D12_INFO_QUEUE_FILTER_DESC {
            NumSeverities: severities.len() as u32,
            pSeverityList: severities.as_mut_ptr(),
            NumIDs: deny_ids.len() as u32,
            pIDList: deny_ids.as_mut_ptr(),
            ..Default::default()
        },
        ..Default::default()
    };

    if let Err(e) = unsafe { info_queue.PushStorageFilter(&filter) } {
        log::warn!("failed to filter debug layer messages: {e}");
    }
}

/// Dumps the DXGI objects still alive to the debugger output.
pub fn report_live_objects() {
    unsafe {
        if let Ok(dxgi_debug) = DXGIGetDebugInterface1::<IDXGIDebug1>(0) {
            let _ = dxgi_debug.ReportLiveObjects(
                DXGI_DEBUG_ALL,
                DXGI_DEBUG_RLO_DETAIL | DXGI_DEBUG_RLO_IGNORE_INTERNAL,
            );
        }
    }
}

struct DxgiAdapters<'a> {
    factory: &'a IDXGIFactory6,
}

impl AdapterSource for DxgiAdapters<'_> {
    type Adapter = IDXGIAdapter1;
    type Device = ID3D12Device;

    fn enum_adapter(&self, index: u32) -> Result<Option<IDXGIAdapter1>> {
        match unsafe {
            self.factory
                .EnumAdapterByGpuPreference::<IDXGIAdapter1>(index, DXGI_GPU_PREFERENCE_UNSPECIFIED)
        } {
            Ok(adapter) => Ok(Some(adapter)),
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self, adapter: &IDXGIAdapter1) -> Result<AdapterDesc> {
        let desc = unsafe { adapter.GetDesc1() }?;

        let len = desc
            .Description
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(desc.Description.len());

        Ok(AdapterDesc {
            description: String::from_utf16_lossy(&desc.Description[..len]),
            is_software: (DXGI_ADAPTER_FLAG(desc.Flags as _) & DXGI_ADAPTER_FLAG_SOFTWARE)
                != DXGI_ADAPTER_FLAG_NONE,
        })
    }

    fn create_device(&self, adapter: &IDXGIAdapter1) -> Result<ID3D12Device> {
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(adapter, D3D_FEATURE_LEVEL_12_1, &mut device) }?;
        device.ok_or_else(|| Error::native(DXGI_ERROR_NOT_FOUND.0, "no device returned"))
    }
}

// The device, queue and factory outlive every object created from them.
#[allow(unused)]
pub struct D3d12Backend {
    command_list: ID3D12GraphicsCommandList,
    command_allocator: ID3D12CommandAllocator,
    swap_chain: SwapChain,
    command_queue: ID3D12CommandQueue,
    device: ID3D12Device,
    factory: IDXGIFactory6,
}

impl FrameBackend for D3d12Backend {
    fn record_frame(&mut self, back_buffer: u32, clear_color: [f32; 4]) -> Result<()> {
        // Command list allocators can only be reset when the associated
        // command lists have finished execution on the GPU.
        unsafe { self.command_allocator.Reset() }?;
        unsafe { self.command_list.Reset(&self.command_allocator, None) }?;

        let render_target = self.swap_chain.back_buffer(back_buffer);
        let rtv_handle = self.swap_chain.rtv_handle(back_buffer);

        unsafe {
            // Indicate that the back buffer will be used as a render target.
            self.command_list.ResourceBarrier(&[transition_barrier(
                render_target,
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            )]);

            self.command_list
                .OMSetRenderTargets(1, Some(&rtv_handle), false, None);
            self.command_list
                .ClearRenderTargetView(rtv_handle, &clear_color, None);

            // Indicate that the back buffer will now be used to present.
            self.command_list.ResourceBarrier(&[transition_barrier(
                render_target,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            )]);
        }

        unsafe { self.command_list.Close() }?;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let command_list = Some(self.command_list.cast::<ID3D12CommandList>()?);
        unsafe { self.command_queue.ExecuteCommandLists(&[command_list]) };
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        self.swap_chain.present(sync_interval)
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.swap_chain.current_back_buffer_index()
    }
}

pub struct D3d12Fence {
    queue: ID3D12CommandQueue,
    fence: ID3D12Fence,
    event: HANDLE,
}

impl D3d12Fence {
    pub fn new(device: &ID3D12Device, queue: &ID3D12CommandQueue) -> Result<Self> {
        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }?;

        // Auto-reset, initially unsignaled.
        let event = unsafe { CreateEventA(None, false, false, None) }?;

        Ok(Self {
            queue: queue.clone(),
            fence,
            event,
        })
    }
}

impl FenceTimeline for D3d12Fence {
    fn signal(&mut self, value: u64) -> Result<()> {
        unsafe { self.queue.Signal(&self.fence, value) }?;
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_until(&mut self, value: u64) -> Result<()> {
        unsafe { self.fence.SetEventOnCompletion(value, self.event) }?;

        if unsafe { WaitForSingleObject(self.event, INFINITE) } == WAIT_FAILED {
            return Err(Error::last_os_error());
        }

        Ok(())
    }
}

impl Drop for D3d12Fence {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.event) } {
            log::error!("failed to close fence event: {e}");
        }
    }
}
